//! Tracing output that never touches the heap. The allocator may be the
//! process allocator, so anything that formats into a `String` (or takes the
//! stdio lock, which may allocate its buffer) can recurse straight back into
//! us.

use std::{ffi::CStr, ptr::NonNull};

use libc::{c_void, STDERR_FILENO};

/// Write raw bytes to stderr, retrying short writes and dropping the rest on
/// error
pub fn write_stderr(mut bytes: &[u8]) {
    while !bytes.is_empty() {
        // SAFETY: `bytes` is a live slice for the duration of the call
        let n = unsafe { libc::write(STDERR_FILENO, bytes.as_ptr() as *const c_void, bytes.len()) };
        if n <= 0 {
            return;
        }
        bytes = &bytes[n as usize..];
    }
}

/// `puts`... but safe (doesn't use the allocator)
pub fn putstr(s: &CStr) {
    write_stderr(s.to_bytes());
    write_stderr(b"\n");
}

/// Something `put!` knows how to print without allocating
pub trait Put {
    fn put(&self);
}

impl Put for &str {
    fn put(&self) {
        write_stderr(self.as_bytes());
    }
}

/// Render `n` in decimal into the tail of `buf`, with a leading `-` if
/// `negative`
fn digits(mut n: usize, negative: bool, buf: &mut [u8; 21]) -> &[u8] {
    // u64::MAX has 20 digits, plus the sign
    let mut i = buf.len();
    loop {
        i -= 1;
        buf[i] = b'0' + (n % 10) as u8;
        n /= 10;
        if n == 0 {
            break;
        }
    }
    if negative {
        i -= 1;
        buf[i] = b'-';
    }
    &buf[i..]
}

impl Put for usize {
    fn put(&self) {
        write_stderr(digits(*self, false, &mut [0; 21]));
    }
}

impl Put for isize {
    fn put(&self) {
        write_stderr(digits(self.unsigned_abs(), *self < 0, &mut [0; 21]));
    }
}

impl<T> Put for *mut T {
    fn put(&self) {
        (*self as usize).put();
    }
}

impl<T> Put for NonNull<T> {
    fn put(&self) {
        self.as_ptr().put();
    }
}

/// Print each fragment, only when built with the `trace` feature
#[macro_export]
macro_rules! put {
    ($($arg:expr),* $(,)?) => {
        if cfg!(feature = "trace") {
            $($crate::util::print::Put::put(&$arg);)*
        }
    };
}

/// Like `put!()` with a trailing newline
#[macro_export]
macro_rules! putln {
    ($($arg:expr),* $(,)?) => {
        $crate::put!($($arg,)* "\n")
    };
}

/// Print `msg` and abort. For bookkeeping that can only be wrong if the heap
/// is already corrupt.
pub fn fatal(msg: &CStr) -> ! {
    putstr(msg);
    std::process::abort()
}
