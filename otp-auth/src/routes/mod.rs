// SPDX-License-Identifier: BSD-3-Clause
// Copyright (c) 2026 Aleksandr Ptakhin

//! Route handlers for the HTTP API.

pub mod handlers;
pub mod openapi;
pub mod users;

pub use handlers::UserHandlers;
pub use users::{user_router, AuthController};
