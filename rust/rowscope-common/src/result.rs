pub type Result<T> = std::result::Result<T, crate::error::Error>;

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
        invalid_arg(name, condition)
    }
}

#[cold]
pub fn invalid_arg(name: &str, condition: &str) -> Result<()> {
    Err(crate::error::ErrorKind::InvalidArgument {
        name: name.to_string(),
        message: condition.to_string(),
    }
    .into())
}

#[cfg(test)]
mod tests {
    use crate::{Result, error::ErrorKind};

    fn check_batch_size(batch_size: usize) -> Result<()> {
        verify_arg!(batch_size, batch_size > 0);
        Ok(())
    }

    #[test]
    fn test_verify_arg_reports_condition() {
        assert!(check_batch_size(60).is_ok());
        let err = check_batch_size(0).unwrap_err();
        match err.kind() {
            ErrorKind::InvalidArgument { name, message } => {
                assert_eq!(name, "batch_size");
                assert_eq!(message, "batch_size > 0");
            }
            other => panic!("unexpected error kind: {other:?}"),
        }
    }
}
