// SPDX-License-Identifier: BSD-3-Clause
// Copyright (c) 2026 Aleksandr Ptakhin

pub mod auth;
pub mod auth_db;
pub mod auth_error;
pub mod email;
pub mod logging;
pub mod memory_store;
