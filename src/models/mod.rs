pub(crate) mod requests;
pub(crate) mod responses;

pub(crate) use requests::*;
pub(crate) use responses::*;
