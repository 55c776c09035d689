/*
 * Copyright (c) 2026, the gnss-ingest contributors.
 *
 * Licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License. You may
 * obtain a copy of the License at http://www.apache.org/licenses/LICENSE-2.0.
 *
 * Unless required by applicable law or agreed to in writing, software
 * distributed under the License is distributed on an "AS IS" BASIS,
 * WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 * See the License for the specific language governing permissions and
 * limitations under the License.
 */

use std::io;

/// shorthand for building a tagged `std::io::Error` with a formatted message.
#[macro_export]
macro_rules! io_error {
    ( $kind:expr, $fmt:literal $(, $arg:expr)* ) =>
    {
        std::io::Error::new( $kind, format!($fmt $(, $arg)*).as_str())
    }
}
pub use io_error;
