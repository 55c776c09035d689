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

//! Domain model and shared logic for the GNSS ingestion core: the pieces
//! used by both the `gnss_dispatcher` and `gnss_jobengine` binaries.

pub mod ident;
pub mod catalog;
pub mod parse;
pub mod rinex_set;
pub mod state;
pub mod job;
pub mod command;
pub mod ledger;
pub mod unpack;
pub mod pending;

pub use ident::WorkUnitId;
