use axum::http::{Method, StatusCode};

/// Conventional actions of a resource controller and the routes they get.
///
/// | action    | route            | status |
/// |-----------|------------------|--------|
/// | `index`   | `GET /`          | 200    |
/// | `new`     | `GET /new`       | 200    |
/// | `show`    | `GET /:id`       | 200    |
/// | `create`  | `POST /`         | 201    |
/// | `edit`    | `GET /:id/edit`  | 200    |
/// | `update`  | `PATCH /:id`     | 200    |
/// | `destroy` | `DELETE /:id`    | 200    |
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    strum_macros::Display,
    strum_macros::EnumIter,
    strum_macros::IntoStaticStr,
)]
#[strum(serialize_all = "lowercase")]
pub enum ResourceAction {
    Index,
    New,
    Show,
    Create,
    Edit,
    Update,
    Destroy,
}

impl ResourceAction {
    /// Action key the route points at.
    pub fn key(self) -> &'static str {
        self.into()
    }

    pub fn method(self) -> Method {
        match self {
            ResourceAction::Create => Method::POST,
            ResourceAction::Update => Method::PATCH,
            ResourceAction::Destroy => Method::DELETE,
            _ => Method::GET,
        }
    }

    pub fn path(self) -> &'static str {
        match self {
            ResourceAction::Index | ResourceAction::Create => "/",
            ResourceAction::New => "/new",
            ResourceAction::Show | ResourceAction::Update | ResourceAction::Destroy => "/:id",
            ResourceAction::Edit => "/:id/edit",
        }
    }

    pub fn status(self) -> StatusCode {
        match self {
            ResourceAction::Create => StatusCode::CREATED,
            _ => StatusCode::OK,
        }
    }
}
