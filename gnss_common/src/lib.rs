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
//! Small utilities shared by the dispatcher and job-engine binaries:
//! filesystem helpers, an epoch-millis timestamp type and external-process
//! invocation. Anything domain specific lives in `gnss_core`.

pub mod macros;
pub mod fs;
pub mod datetime;
pub mod process;
