pub mod department_repo;
pub mod dialog_repo;
pub mod session_repo;
pub mod tenancy_repo;
pub mod user_repo;

pub use department_repo::DepartmentRepository;
pub use dialog_repo::DialogRepository;
pub use session_repo::SessionRepository;
pub use tenancy_repo::TenancyRepository;
pub use user_repo::UserRepository;
