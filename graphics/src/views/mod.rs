//! Resource views.
//!
//! A descriptor view holds a shared reference to its resource and owns one
//! descriptor slot holding the recorded description. Construction checks the
//! description against the resource before any slot is taken; dropping the
//! view returns the slot to its heap.

mod constant;
mod input;
mod shader_resource;
mod target;
mod validation;

pub use constant::ConstBufferView;
pub use input::{IndexBufferView, VertexBufferView};
pub use shader_resource::{BufferSrv, Texture1DSrv, Texture2DSrv, Texture3DSrv, TextureCubeSrv};
pub use target::{DepthStencilView, RenderTargetView};
