//! Target addresses passed to tmux via `-t <target>`.
//!
//! Addresses are derived from the parent chain on every call and never
//! cached: a window renamed or a pane killed elsewhere changes them.
//!
//! tmux resolves a name with no exact match by prefix or pattern, so a
//! vanished `S` would silently address a live `Sx`. Commands are therefore
//! issued with [`Target::exact_target`], which pins every name with `=`.

use crate::model::{Pane, Session, Window};

/// Anything tmux can address with `-t`.
pub trait Target {
    fn target(&self) -> String;

    /// The address with each name marked for exact matching.
    fn exact_target(&self) -> String;
}

impl Target for Session {
    /// `session`
    fn target(&self) -> String {
        self.name.clone()
    }

    /// `=session:`; the trailing colon keeps window-type commands from
    /// reading the name as a window.
    fn exact_target(&self) -> String {
        format!("={}:", self.name)
    }
}

impl Target for Window {
    /// `session:window-name`
    fn target(&self) -> String {
        format!("{}:{}", self.session.target(), self.name)
    }

    /// `=session:=window-name`
    fn exact_target(&self) -> String {
        format!("={}:={}", self.session.name, self.name)
    }
}

impl Target for Pane {
    /// `session:window-name.pane-id`
    fn target(&self) -> String {
        format!("{}.{}", self.window.target(), self.id)
    }

    /// `=session:=window-name.pane-id`; pane ids are already unique.
    fn exact_target(&self) -> String {
        format!("{}.{}", self.window.exact_target(), self.id)
    }
}

impl<T: Target + ?Sized> Target for &T {
    fn target(&self) -> String {
        (**self).target()
    }

    fn exact_target(&self) -> String {
        (**self).exact_target()
    }
}
