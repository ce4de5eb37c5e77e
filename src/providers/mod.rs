pub mod mla;
pub mod util;
