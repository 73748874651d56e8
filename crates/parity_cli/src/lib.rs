pub mod backend_factory;
pub mod project_init;
pub mod report;

pub use backend_factory::{compiled_backends, BackendFactory};
pub use project_init::{init_project, InitProjectInput, InitProjectOutput};
pub use report::render_report_lines;
