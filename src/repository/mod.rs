pub mod attendance;
pub mod employee;

pub use attendance::AttendanceRepository;
pub use employee::EmployeeRepository;
