// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

pub mod attachment;
pub mod catalog;
pub mod errors;
pub mod ids;
pub mod model;
pub mod session;
pub mod state;

pub use attachment::*;
pub use catalog::*;
pub use errors::*;
pub use ids::*;
pub use model::*;
pub use session::*;
pub use state::*;
