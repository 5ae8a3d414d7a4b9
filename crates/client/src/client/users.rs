//! Users API client methods

use super::{ApiClient, ClientError};
use crate::types::{
    ChangePasswordRequest, LoginRequest, RegisterRequest, TokenResponse, UserProfile,
};
use reqwest::{Method, StatusCode};

pub const REGISTER_PATH: &str = "/api/v1/users/";
pub const LOGIN_PATH: &str = "/api/v1/users/login";
pub const TOKEN_PATH: &str = "/api/v1/users/token";
pub const LOGOUT_PATH: &str = "/api/v1/users/logout";
pub const PASSWORD_PATH: &str = "/api/v1/users/password";

impl ApiClient {
    /// Register a new account
    pub async fn register(&self, request: &RegisterRequest) -> Result<UserProfile, ClientError> {
        request.validate()?;
        let req = self.request(Method::POST, REGISTER_PATH).json(request);
        self.execute(req).await
    }

    /// Log in, receiving an access token and the refresh cookie
    pub async fn login(&self, request: &LoginRequest) -> Result<TokenResponse, ClientError> {
        request.validate()?;
        let req = self.request(Method::POST, LOGIN_PATH).json(request);
        self.execute(req).await
    }

    /// Exchange the refresh cookie for a new access token
    pub async fn refresh_token(&self) -> Result<TokenResponse, ClientError> {
        let req = self.request(Method::GET, TOKEN_PATH);
        self.execute(req).await
    }

    /// Invalidate the session server side
    pub async fn logout(&self, access_token: &str) -> Result<(), ClientError> {
        let req = self.authorized(Method::POST, LOGOUT_PATH, access_token);
        self.execute_empty(req, StatusCode::NO_CONTENT).await
    }

    /// Change the password of the logged in user
    pub async fn change_password(
        &self,
        access_token: &str,
        request: &ChangePasswordRequest,
    ) -> Result<(), ClientError> {
        request.validate()?;
        let req = self
            .authorized(Method::PATCH, PASSWORD_PATH, access_token)
            .json(request);
        self.execute_empty(req, StatusCode::NO_CONTENT).await
    }
}
