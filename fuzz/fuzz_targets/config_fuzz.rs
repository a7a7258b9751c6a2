#![no_main]
use libfuzzer_sys::fuzz_target;
use std::path::Path;
use tempmount::modules::command::mount_args;
use tempmount::TempMount;

fuzz_target!(|data: &[u8]| {
    if let Ok(device) = std::str::from_utf8(data) {
        match TempMount::new(device) {
            Ok(mount) => {
                assert!(!device.is_empty());
                assert_eq!(mount.device(), Path::new(device));

                // The device must always be the second to last argument
                let target = Path::new("/tmp/tempmount.fuzz");
                for loop_mount in [false, true] {
                    let args = mount_args(mount.device(), target, loop_mount);
                    assert_eq!(args.len(), if loop_mount { 4 } else { 2 });
                    assert_eq!(args[args.len() - 2], mount.device().as_os_str());
                    assert_eq!(args[args.len() - 1], target.as_os_str());
                }
            }
            Err(_) => assert!(device.is_empty()),
        }
    }
});
