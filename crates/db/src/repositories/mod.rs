mod controller_repo;

pub use controller_repo::ControllerRepo;
