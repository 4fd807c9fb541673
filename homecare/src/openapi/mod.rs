//! OpenAPI documentation configuration.
//!
//! [`ApiDoc`] covers the sign-in routes and page loaders at the root, with the JSON API from
//! [`portal::PortalApiDoc`] nested under `/api/v1`. It is served at `/api/openapi.json` and
//! rendered at `/api/docs`.

pub mod portal;

pub use portal::ApiDoc;
