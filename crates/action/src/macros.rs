//! Early-return sugar for user logic.

/// Halt the current body or hook with an explicit failure.
///
/// Expands to an early `return` with an [`Interrupt::Failure`]
/// signal; with arguments, the formatted string becomes the result's
/// error message.
///
/// [`Interrupt::Failure`]: crate::Interrupt::Failure
///
/// ```
/// use operon_action::{ActionDefinition, fail};
///
/// let def = ActionDefinition::builder("guarded")
///     .body(|_cx| {
///         fail!("quota exceeded");
///     })
///     .build()
///     .unwrap();
///
/// let result = def.call(());
/// assert!(!result.ok());
/// assert_eq!(result.error(), Some("quota exceeded"));
/// ```
#[macro_export]
macro_rules! fail {
    () => {
        return Err($crate::Interrupt::failure_silent())
    };
    ($($arg:tt)*) => {
        return Err($crate::Interrupt::failure(format!($($arg)*)))
    };
}

/// Halt the current body or hook, finalizing as success.
///
/// Early completion is a control signal, not an error: remaining hooks
/// and outbound validation are skipped and the result is ok. With
/// arguments, the formatted string becomes the result's success message.
#[macro_export]
macro_rules! done {
    () => {
        return Err($crate::Interrupt::done_silent())
    };
    ($($arg:tt)*) => {
        return Err($crate::Interrupt::done(format!($($arg)*)))
    };
}

#[cfg(test)]
mod tests {
    use crate::definition::ActionDefinition;

    #[test]
    fn fail_macro_formats_its_message() {
        let def = ActionDefinition::builder("failing")
            .body(|_cx| {
                let quota = 3;
                fail!("quota {quota} exceeded");
            })
            .build()
            .unwrap();

        let result = def.call(());
        assert_eq!(result.error(), Some("quota 3 exceeded"));
    }

    #[test]
    fn bare_fail_has_no_message() {
        let def = ActionDefinition::builder("failing")
            .body(|_cx| fail!())
            .build()
            .unwrap();

        let result = def.call(());
        assert!(!result.ok());
        assert_eq!(result.error(), Some(crate::messages::DEFAULT_ERROR_MESSAGE));
    }

    #[test]
    fn done_macro_finalizes_as_success() {
        let def = ActionDefinition::builder("early")
            .body(|_cx| {
                done!("nothing to do");
            })
            .build()
            .unwrap();

        let result = def.call(());
        assert!(result.ok());
        assert_eq!(result.success(), Some("nothing to do"));
    }
}
