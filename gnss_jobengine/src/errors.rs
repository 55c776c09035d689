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
pub enum EngineError {
    #[error("job engine io error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Config(#[from] gnss_config::errors::ConfigError),

    #[error(transparent)]
    Job(#[from] gnss_core::job::JobError),

    #[error(transparent)]
    State(#[from] gnss_core::state::StateError),

    #[error(transparent)]
    RinexSet(#[from] gnss_core::rinex_set::RinexSetError),

    #[error(transparent)]
    Command(#[from] gnss_core::command::CommandError),

    #[error("external program {program} failed: {detail}")]
    ProgramFailed { program: String, detail: String },
}
