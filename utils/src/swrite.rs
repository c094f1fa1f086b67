/// Appends formatted text directly into a `String`, like [`write!`],
/// but without returning a `Result`.
///
/// Writing to a `String` through [`std::fmt::Write::write_fmt`] cannot fail,
/// so the result is unwrapped. Saves the temporary `String` that
/// `push_str(&format!(...))` would allocate.
///
/// # Examples
///
/// ```
/// use utils::swrite;
///
/// let s = &mut String::new();
/// swrite!(s, "{:04}  {}\n", 0, "POP");
/// swrite!(s, "{:04}  {} {}\n", 1, "PUSH", -7);
/// assert_eq!(s, "0000  POP\n0001  PUSH -7\n");
/// ```
#[macro_export]
macro_rules! swrite {
    ($s:expr, $($arg:tt)*) => {{
        ::std::fmt::Write::write_fmt($s, format_args!($($arg)*)).unwrap()
    }};
}
