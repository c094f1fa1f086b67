/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at http://mozilla.org/MPL/2.0/. */

/// Debug-only logging. Prints to stderr when the crate is built with debug
/// assertions *and* `DEBUG_LOG` is set in the environment.
#[macro_export]
macro_rules! dlog {
    ($($arg:tt)*) => {{
        if cfg!(debug_assertions) {
            if ::std::env::var_os("DEBUG_LOG").is_some() {
                eprintln!($($arg)*)
            }
        }
    }};
}

