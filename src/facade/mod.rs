mod mapper;

pub use mapper::EntityMapper;
