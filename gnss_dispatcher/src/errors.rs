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

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DispatcherError {
    #[error("dispatcher io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{site} {year} {doy} hour 0 already processed; run forget")]
    AlreadyProcessed { site: String, year: u16, doy: u16 },

    #[error(transparent)]
    Config(#[from] gnss_config::errors::ConfigError),

    #[error(transparent)]
    Catalog(#[from] gnss_core::catalog::CatalogError),

    #[error(transparent)]
    Ledger(#[from] gnss_core::ledger::LedgerError),

    #[error(transparent)]
    Watch(#[from] notify::Error),
}
