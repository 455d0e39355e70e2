//! `manage-resources`-gated CRUD for resources, roles, role-resource
//! membership, paths and path-resource bindings — the configuration
//! surface behind [`crate::admin`]. Split into three controllers by
//! entity the way `demos/example-multi-tenant` splits `AdminController`
//! from `TenantController` by audience rather than cramming every route
//! onto one struct.

use r2e::prelude::*;

use crate::authn::TokenUser;
use crate::cache::{RoleResCache, UrlCache};
use crate::distlock::DistLock;
use crate::dto::{
    AddRoleReq, AddRoleRes, AddRoleResourceReq, BindPathResourceReq, CreatePathReq, CreatePathRes,
    CreateResourceReq, DeletePathReq, DeleteResourceReq, RemoveRoleResourceReq, UnbindPathResourceReq,
};
use crate::model::{Path as PathRow, Resource, Role};
use crate::state::AppState;
use crate::store::Store;

#[derive(Controller)]
#[controller(path = "/open/api/resource", state = AppState)]
pub struct ResourceAdminController {
    #[inject]
    store: Store,
    #[inject]
    distlock: DistLock,
    #[inject]
    url_cache: UrlCache,
    #[inject]
    role_res_cache: RoleResCache,
}

#[routes]
impl ResourceAdminController {
    #[get("/list")]
    #[guard(crate::guards::ResourceGuard::new("manage-resources"))]
    async fn list(&self, #[inject(identity)] _caller: TokenUser) -> Result<Json<Vec<Resource>>, AppError> {
        Ok(Json(self.store.list_resources().await?))
    }

    #[post("/create")]
    #[guard(crate::guards::ResourceGuard::new("manage-resources"))]
    async fn create(
        &self,
        #[inject(identity)] caller: TokenUser,
        Json(body): Json<CreateResourceReq>,
    ) -> Result<(), AppError> {
        crate::admin::create_resource(&self.distlock, &self.store, &body.code, &body.name, &caller.username).await
    }

    #[post("/delete")]
    #[guard(crate::guards::ResourceGuard::new("manage-resources"))]
    async fn delete(
        &self,
        #[inject(identity)] _caller: TokenUser,
        Json(body): Json<DeleteResourceReq>,
    ) -> Result<(), AppError> {
        crate::admin::delete_resource(
            &self.distlock,
            &self.store,
            &self.url_cache,
            &self.role_res_cache,
            &body.code,
        )
        .await
    }
}

#[derive(Controller)]
#[controller(path = "/open/api/role", state = AppState)]
pub struct RoleAdminController {
    #[inject]
    store: Store,
    #[inject]
    role_res_cache: RoleResCache,
    #[inject]
    distlock: DistLock,
}

#[routes]
impl RoleAdminController {
    #[get("/list")]
    #[guard(crate::guards::ResourceGuard::new("manage-resources"))]
    async fn list(&self, #[inject(identity)] _caller: TokenUser) -> Result<Json<Vec<Role>>, AppError> {
        Ok(Json(self.store.list_roles().await?))
    }

    #[post("/create")]
    #[guard(crate::guards::ResourceGuard::new("manage-resources"))]
    async fn create(
        &self,
        #[inject(identity)] caller: TokenUser,
        Json(body): Json<AddRoleReq>,
    ) -> Result<Json<AddRoleRes>, AppError> {
        let role_no = crate::admin::add_role(&self.store, &body.name, &caller.username).await?;
        Ok(Json(AddRoleRes { role_no }))
    }

    #[post("/resource/add")]
    #[guard(crate::guards::ResourceGuard::new("manage-resources"))]
    async fn add_resource(
        &self,
        #[inject(identity)] caller: TokenUser,
        Json(body): Json<AddRoleResourceReq>,
    ) -> Result<(), AppError> {
        crate::admin::add_role_resource(
            &self.distlock,
            &self.store,
            &self.role_res_cache,
            &body.role_no,
            &body.res_code,
            &caller.username,
        )
        .await
    }

    #[post("/resource/remove")]
    #[guard(crate::guards::ResourceGuard::new("manage-resources"))]
    async fn remove_resource(
        &self,
        #[inject(identity)] _caller: TokenUser,
        Json(body): Json<RemoveRoleResourceReq>,
    ) -> Result<(), AppError> {
        crate::admin::remove_role_resource(&self.store, &self.role_res_cache, &body.role_no, &body.res_code).await
    }
}

#[derive(Controller)]
#[controller(path = "/open/api/path", state = AppState)]
pub struct PathAdminController {
    #[inject]
    store: Store,
    #[inject]
    distlock: DistLock,
    #[inject]
    url_cache: UrlCache,
}

#[routes]
impl PathAdminController {
    #[get("/list")]
    #[guard(crate::guards::ResourceGuard::new("manage-resources"))]
    async fn list(&self, #[inject(identity)] _caller: TokenUser) -> Result<Json<Vec<PathRow>>, AppError> {
        Ok(Json(self.store.list_paths().await?))
    }

    #[post("/create")]
    #[guard(crate::guards::ResourceGuard::new("manage-resources"))]
    async fn create(
        &self,
        #[inject(identity)] caller: TokenUser,
        Json(body): Json<CreatePathReq>,
    ) -> Result<Json<CreatePathRes>, AppError> {
        let path_no = crate::admin::create_or_update_path(
            &self.distlock,
            &self.store,
            &self.url_cache,
            &body.group,
            &body.method,
            &body.url,
            body.ptype,
            &body.desc,
            &caller.username,
        )
        .await?;
        Ok(Json(CreatePathRes { path_no }))
    }

    #[post("/delete")]
    #[guard(crate::guards::ResourceGuard::new("manage-resources"))]
    async fn delete(
        &self,
        #[inject(identity)] caller: TokenUser,
        Json(body): Json<DeletePathReq>,
    ) -> Result<(), AppError> {
        crate::admin::delete_path(&self.distlock, &self.store, &self.url_cache, &body.path_no, &caller.username).await
    }

    #[post("/resource/bind")]
    #[guard(crate::guards::ResourceGuard::new("manage-resources"))]
    async fn bind_resource(
        &self,
        #[inject(identity)] caller: TokenUser,
        Json(body): Json<BindPathResourceReq>,
    ) -> Result<(), AppError> {
        crate::admin::bind_path_resource(
            &self.distlock,
            &self.store,
            &self.url_cache,
            &body.path_no,
            &body.res_code,
            &caller.username,
        )
        .await
    }

    #[post("/resource/unbind")]
    #[guard(crate::guards::ResourceGuard::new("manage-resources"))]
    async fn unbind_resource(
        &self,
        #[inject(identity)] _caller: TokenUser,
        Json(body): Json<UnbindPathResourceReq>,
    ) -> Result<(), AppError> {
        crate::admin::unbind_path_resource(&self.distlock, &self.store, &self.url_cache, &body.path_no).await
    }
}
