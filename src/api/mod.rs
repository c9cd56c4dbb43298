//! HTTP 接口文档 / API documentation
pub mod swagger;
