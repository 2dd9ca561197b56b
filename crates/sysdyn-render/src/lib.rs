//! sysdyn-render — Raster rendering of simulation results and model
//! diagrams. Plotters draws into a temp-file PNG; callers get the bytes
//! back base64-encoded for transport in JSON bodies.

pub mod diagram;
pub mod layout;
pub mod plot;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;

pub use diagram::render_sfd_png;
pub use plot::render_results_png;

/// Encode PNG bytes for a JSON `image_base64` field.
pub fn png_base64(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}
