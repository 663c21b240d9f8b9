// Panic in debug builds, no-op in release; callers must provide a release fallback
#[macro_export]
macro_rules! debug_panic
{
    ($($arg:tt)*) =>
    {
        if cfg!(debug_assertions)
        {
            panic!($($arg)*)
        }
    }
}
