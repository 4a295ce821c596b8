//! Helper bersama untuk stress test

use std::process::Command;
use std::thread;
use std::time::{Duration, Instant};

const CHILD_ENV: &str = "BYTERING_ABORT_CHILD";

/// Jalankan `body` di child process dan pastikan child ter-abort.
///
/// Parent me-re-exec binary test ini dengan filter `test` dan env
/// `BYTERING_ABORT_CHILD`; child menjalankan `body`. Child yang hang lebih
/// dari `timeout` di-kill dan dianggap gagal.
pub fn assert_aborts(test: &str, timeout: Duration, body: impl FnOnce()) {
    if std::env::var_os(CHILD_ENV).is_some() {
        body();
        return;
    }

    let mut child = Command::new(std::env::current_exe().expect("test binary path"))
        .args([test, "--exact", "--nocapture", "--test-threads=1"])
        .env(CHILD_ENV, "1")
        .spawn()
        .expect("spawn child test");

    let deadline = Instant::now() + timeout;
    let status = loop {
        if let Some(status) = child.try_wait().expect("poll child test") {
            break status;
        }
        if Instant::now() > deadline {
            let _ = child.kill();
            let _ = child.wait();
            panic!("{} still running after {:?}: oversized call did not abort", test, timeout);
        }
        thread::sleep(Duration::from_millis(10));
    };

    assert!(!status.success(), "{} exited cleanly: {}", test, status);
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        // SIGABRT
        assert_eq!(status.signal(), Some(6), "{} did not abort: {}", test, status);
    }
}
