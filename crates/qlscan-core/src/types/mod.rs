mod finding;
mod history;
mod installation;
mod scan;

pub use finding::*;
pub use history::*;
pub use installation::*;
pub use scan::*;
