use core::convert::Infallible;

/// Unwrap results of HAL operations that cannot fail
///
/// GPIO and matrix operations of the HAL return `Result<_, Infallible>`, this
/// avoids `unwrap()` calls that could never panic anyway.
pub trait InfallibleResult<T> {
    fn infallible(self) -> T;
}

impl<T> InfallibleResult<T> for Result<T, Infallible> {
    fn infallible(self) -> T {
        match self {
            Ok(v) => v,
            Err(never) => match never {},
        }
    }
}
