/*
 *  error.rs
 *
 *  LumaDeck - worth the squeeze
 *  (c) 2020-26 Stuart Hunter
 *
 *  Error kinds shared by widgets, providers and background workers
 *
 *  This program is free software: you can redistribute it and/or modify
 *  it under the terms of the GNU General Public License as published by
 *  the Free Software Foundation, either version 3 of the License, or
 *  (at your option) any later version.
 *
 *  This program is distributed in the hope that it will be useful,
 *  but WITHOUT ANY WARRANTY; without even the implied warranty of
 *  MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 *  GNU General Public License for more details.
 *
 *  See <http://www.gnu.org/licenses/> to get a copy of the GNU General
 *  Public License.
 *
 */

use thiserror::Error;

/// Errors surfaced by widget `update`/`render` and the providers behind them.
///
/// Cloneable so sticky failures (a capture that never initialised, an
/// unsupported platform back-end) can be handed out on every access.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum WidgetError {
    /// Transient provider failure, expected at steady state; keep polling.
    #[error("provider error: {0}")]
    Provider(String),

    /// A shared singleton failed to initialise.
    #[error("not initialized: {0}")]
    NotInitialized(String),

    /// Network or service connection failure (Telegram, weather).
    #[error("connection error: {0}")]
    Connection(String),

    /// Malformed provider payload.
    #[error("decode error: {0}")]
    Decode(String),

    /// Missing resource such as a font face or a WAD file.
    #[error("resource error: {0}")]
    Resource(String),

    /// OS back-end not available on this platform.
    #[error("platform unsupported: {0}")]
    PlatformUnsupported(String),

    /// Invalid or unknown widget configuration.
    #[error("configuration error: {0}")]
    Config(String),
}

pub type WidgetResult<T> = Result<T, WidgetError>;

impl WidgetError {
    /// Short label suitable for a tiny status tile.
    pub fn short_label(&self) -> &'static str {
        match self {
            WidgetError::Provider(_) => "ERR",
            WidgetError::NotInitialized(_) => "N/A",
            WidgetError::Connection(_) => "NET",
            WidgetError::Decode(_) => "BAD",
            WidgetError::Resource(_) => "RES",
            WidgetError::PlatformUnsupported(_) => "N/S",
            WidgetError::Config(_) => "CFG",
        }
    }
}

impl From<std::io::Error> for WidgetError {
    fn from(err: std::io::Error) -> Self {
        WidgetError::Provider(err.to_string())
    }
}

impl From<serde_json::Error> for WidgetError {
    fn from(err: serde_json::Error) -> Self {
        WidgetError::Decode(err.to_string())
    }
}

impl From<reqwest::Error> for WidgetError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            WidgetError::Decode(err.to_string())
        } else {
            WidgetError::Connection(err.to_string())
        }
    }
}
