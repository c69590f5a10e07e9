// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

pub mod cascade;
pub mod catalog;
pub mod draft;
pub mod ids;
pub mod model;
pub mod picker;
pub mod rows;
pub mod session;
pub mod state;
pub mod table;

pub use cascade::*;
pub use catalog::*;
pub use draft::*;
pub use ids::*;
pub use model::*;
pub use picker::*;
pub use rows::*;
pub use session::*;
pub use state::*;
pub use table::*;
