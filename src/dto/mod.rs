pub mod auth_dto;
pub mod trainer_dto;
