pub(crate) mod helpers;
pub(crate) mod simulate;
pub(crate) mod verify;
