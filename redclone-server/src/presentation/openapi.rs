use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

use crate::presentation::handlers::auth::{
    AuthResponseDto, ForgotPasswordDto, LoginDto, RegisterDto, ResetPasswordDto, SuccessDto,
    UserDto,
};
use crate::presentation::handlers::posts::{
    CreatePostDto, FeedParams, PaginatedPostsDto, PostDto, UpdatePostDto, VoteDirectionDto,
    VoteDto, VoteResponseDto,
};

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::presentation::handlers::auth::register,
        crate::presentation::handlers::auth::login,
        crate::presentation::handlers::auth::me,
        crate::presentation::handlers::auth::forgot_password,
        crate::presentation::handlers::auth::reset_password,
        crate::presentation::handlers::posts::list_posts,
        crate::presentation::handlers::posts::get_post,
        crate::presentation::handlers::posts::create_post,
        crate::presentation::handlers::posts::update_post,
        crate::presentation::handlers::posts::delete_post,
        crate::presentation::handlers::posts::vote
    ),
    components(
        schemas(
            RegisterDto,
            LoginDto,
            ForgotPasswordDto,
            ResetPasswordDto,
            AuthResponseDto,
            SuccessDto,
            UserDto,
            CreatePostDto,
            UpdatePostDto,
            FeedParams,
            PostDto,
            PaginatedPostsDto,
            VoteDirectionDto,
            VoteDto,
            VoteResponseDto
        )
    ),
    tags(
        (name = "auth", description = "Accounts and password reset"),
        (name = "posts", description = "Posts, feed and voting")
    ),
    modifiers(&SecurityAddon)
)]
pub(crate) struct ApiDoc;

pub(crate) struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let mut components = openapi.components.take().unwrap_or_default();
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
        openapi.components = Some(components);
    }
}
