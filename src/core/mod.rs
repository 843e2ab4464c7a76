// Survey domain: answer encoding, validation, the form and the dashboard math
pub mod encoding {
    pub use crate::encoding::*;
}

pub mod validation {
    pub use crate::validation::*;
}

pub mod form {
    pub use crate::form::*;
}

pub mod filters {
    pub use crate::filters::*;
}

pub mod stats {
    pub use crate::stats::*;
}

pub mod models {
    pub use crate::models::*;
}

pub mod errors {
    pub use crate::errors::*;
}
