pub type Result<T> = std::result::Result<T, crate::error::Error>;

/// Verifies a construction argument, returning `InvalidConfiguration` from the
/// enclosing function when the condition does not hold.
#[macro_export]
macro_rules! verify_arg {
    ($name:expr, $expr:expr) => {{
        let result = $expr;
        $crate::result::verify_arg(result, stringify!($name), stringify!($expr))?;
    }};
}

#[inline]
pub fn verify_arg(predicate: bool, name: &str, condition: &str) -> Result<()> {
    if predicate {
        Ok(())
    } else {
        invalid_config(name, condition)
    }
}

#[cold]
pub fn invalid_config(name: &str, condition: &str) -> Result<()> {
    Err(crate::error::ErrorKind::InvalidConfiguration {
        name: name.to_string(),
        message: condition.to_string(),
    }
    .into())
}

#[cfg(test)]
mod tests {
    use crate::error::ErrorKind;

    fn check(concurrency: usize) -> crate::Result<usize> {
        verify_arg!(concurrency, concurrency > 0);
        Ok(concurrency)
    }

    #[test]
    fn test_verify_arg() {
        assert_eq!(check(3).unwrap(), 3);
        let err = check(0).unwrap_err();
        match err.kind() {
            ErrorKind::InvalidConfiguration { name, message } => {
                assert_eq!(name, "concurrency");
                assert_eq!(message, "concurrency > 0");
            }
            other => panic!("unexpected kind {other:?}"),
        }
    }
}
