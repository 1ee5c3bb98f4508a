mod interaction;
mod tree_view;
mod view;

pub(super) use interaction::{ResettableView, Viewport};
