//! Terminal stand-in for the browser shell around the callback handler.

use crown_auth::{CallbackHost, Route};
use tracing::debug;

/// Reports routing decisions on the terminal instead of moving a page.
pub struct TerminalHost {
    quiet: bool,
}

impl TerminalHost {
    pub fn new(quiet: bool) -> Self {
        Self { quiet }
    }
}

impl CallbackHost for TerminalHost {
    fn replace_location(&self, location: &str) {
        debug!(location, "Callback location cleaned");
    }

    fn navigate(&self, route: Route) {
        if self.quiet {
            return;
        }
        match route {
            Route::Default => println!("Opening home screen"),
            Route::Unauthenticated => println!("Returning to login screen"),
        }
    }
}
