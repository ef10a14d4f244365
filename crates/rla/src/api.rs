/*
 * SPDX-FileCopyrightText: Copyright (c) 2024-2026 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
 * SPDX-License-Identifier: LicenseRef-NvidiaProprietary
 *
 * NVIDIA CORPORATION, its affiliates and licensors retain all intellectual
 * property and proprietary rights in and to this material, related
 * documentation and any modifications thereto. Any use, reproduction,
 * disclosure or distribution of this material and related documentation
 * without an express license agreement from NVIDIA CORPORATION or
 * its affiliates is strictly prohibited.
 */

//! The RackInventory service implementation: the trait methods translate
//! into handler calls one to one.

use std::sync::Arc;

use rpc::rla;
use rpc::rla::rack_inventory_server::RackInventory;
use sqlx::PgPool;
use tonic::{Request, Response, Status};
use workflow::WorkflowEngine;

use crate::actual::ActualComponentSource;
use crate::dispatch::RackOperationDispatcher;
use crate::{handlers, ingest};

pub struct Api {
    pub database_connection: PgPool,
    pub engine: Arc<dyn WorkflowEngine>,
    pub dispatcher: Arc<dyn RackOperationDispatcher>,
    pub actual: Arc<dyn ActualComponentSource>,
}

#[tonic::async_trait]
impl RackInventory for Api {
    async fn create_expected_rack(
        &self,
        request: Request<rla::CreateExpectedRackRequest>,
    ) -> Result<Response<rla::CreateExpectedRackResponse>, Status> {
        handlers::rack::create_expected_rack(self, request).await
    }

    async fn get_rack_info_by_id(
        &self,
        request: Request<rla::GetRackByIdRequest>,
    ) -> Result<Response<rla::RackResponse>, Status> {
        handlers::rack::get_rack_by_id(self, request).await
    }

    async fn get_rack_info_by_serial(
        &self,
        request: Request<rla::GetRackBySerialRequest>,
    ) -> Result<Response<rla::RackResponse>, Status> {
        handlers::rack::get_rack_by_serial(self, request).await
    }

    async fn get_list_of_racks(
        &self,
        request: Request<rla::ListRacksRequest>,
    ) -> Result<Response<rla::ListRacksResponse>, Status> {
        handlers::rack::list_racks(self, request).await
    }

    async fn patch_rack(
        &self,
        request: Request<rla::PatchRackRequest>,
    ) -> Result<Response<rla::RackResponse>, Status> {
        handlers::rack::patch_rack(self, request).await
    }

    async fn delete_rack(
        &self,
        request: Request<rla::DeleteRackRequest>,
    ) -> Result<Response<rla::DeleteRackResponse>, Status> {
        handlers::rack::delete_rack(self, request).await
    }

    async fn mark_rack_ingesting(
        &self,
        request: Request<rla::RackLifecycleRequest>,
    ) -> Result<Response<rla::RackResponse>, Status> {
        handlers::rack::mark_rack_ingesting(self, request).await
    }

    async fn mark_rack_ingested(
        &self,
        request: Request<rla::RackLifecycleRequest>,
    ) -> Result<Response<rla::RackResponse>, Status> {
        handlers::rack::mark_rack_ingested(self, request).await
    }

    async fn create_component(
        &self,
        request: Request<rla::CreateComponentRequest>,
    ) -> Result<Response<rla::CreateComponentResponse>, Status> {
        handlers::component::create_component(self, request).await
    }

    async fn get_component_info_by_id(
        &self,
        request: Request<rla::GetComponentByIdRequest>,
    ) -> Result<Response<rla::ComponentResponse>, Status> {
        handlers::component::get_component_by_id(self, request).await
    }

    async fn get_component_info_by_serial(
        &self,
        request: Request<rla::GetComponentBySerialRequest>,
    ) -> Result<Response<rla::ComponentResponse>, Status> {
        handlers::component::get_component_by_serial(self, request).await
    }

    async fn patch_component(
        &self,
        request: Request<rla::PatchComponentRequest>,
    ) -> Result<Response<rla::ComponentResponse>, Status> {
        handlers::component::patch_component(self, request).await
    }

    async fn set_component_external_id(
        &self,
        request: Request<rla::SetComponentExternalIdRequest>,
    ) -> Result<Response<rla::ComponentResponse>, Status> {
        handlers::component::set_component_external_id(self, request).await
    }

    async fn set_component_power_state(
        &self,
        request: Request<rla::SetComponentPowerStateRequest>,
    ) -> Result<Response<rla::ComponentResponse>, Status> {
        handlers::component::set_component_power_state(self, request).await
    }

    async fn create_nvl_domain(
        &self,
        request: Request<rla::CreateNvlDomainRequest>,
    ) -> Result<Response<rla::NvlDomainResponse>, Status> {
        handlers::nvl_domain::create_nvl_domain(self, request).await
    }

    async fn attach_racks_to_nvl_domain(
        &self,
        request: Request<rla::NvlDomainMembershipRequest>,
    ) -> Result<Response<rla::NvlDomainMembershipResponse>, Status> {
        handlers::nvl_domain::attach_racks(self, request).await
    }

    async fn detach_racks_from_nvl_domain(
        &self,
        request: Request<rla::NvlDomainMembershipRequest>,
    ) -> Result<Response<rla::NvlDomainMembershipResponse>, Status> {
        handlers::nvl_domain::detach_racks(self, request).await
    }

    async fn get_list_of_nvl_domains(
        &self,
        request: Request<rla::ListNvlDomainsRequest>,
    ) -> Result<Response<rla::ListNvlDomainsResponse>, Status> {
        handlers::nvl_domain::list_nvl_domains(self, request).await
    }

    async fn get_racks_for_nvl_domain(
        &self,
        request: Request<rla::GetRacksForNvlDomainRequest>,
    ) -> Result<Response<rla::ListRacksResponse>, Status> {
        handlers::nvl_domain::racks_for_nvl_domain(self, request).await
    }

    async fn upgrade_firmware(
        &self,
        request: Request<rla::UpgradeFirmwareRequest>,
    ) -> Result<Response<rla::TaskList>, Status> {
        handlers::tasks::upgrade_firmware(self, request).await
    }

    async fn power_on_rack(
        &self,
        request: Request<rla::PowerRackRequest>,
    ) -> Result<Response<rla::TaskList>, Status> {
        handlers::tasks::power_on_rack(self, request).await
    }

    async fn power_off_rack(
        &self,
        request: Request<rla::PowerRackRequest>,
    ) -> Result<Response<rla::TaskList>, Status> {
        handlers::tasks::power_off_rack(self, request).await
    }

    async fn power_reset_rack(
        &self,
        request: Request<rla::PowerRackRequest>,
    ) -> Result<Response<rla::TaskList>, Status> {
        handlers::tasks::power_reset_rack(self, request).await
    }

    async fn get_task_status(
        &self,
        request: Request<rla::GetTaskStatusRequest>,
    ) -> Result<Response<rla::TaskStatusResponse>, Status> {
        handlers::tasks::get_task_status(self, request).await
    }

    async fn get_expected_components(
        &self,
        request: Request<rla::ComponentScopeRequest>,
    ) -> Result<Response<rla::ComponentList>, Status> {
        handlers::validation::get_expected_components(self, request).await
    }

    async fn get_actual_components(
        &self,
        request: Request<rla::ComponentScopeRequest>,
    ) -> Result<Response<rla::ComponentList>, Status> {
        handlers::validation::get_actual_components(self, request).await
    }

    async fn validate_components(
        &self,
        request: Request<rla::ComponentScopeRequest>,
    ) -> Result<Response<rla::ValidateComponentsResponse>, Status> {
        handlers::validation::validate(self, request).await
    }

    async fn ingest_inventory_page(
        &self,
        request: Request<rla::IngestInventoryPageRequest>,
    ) -> Result<Response<rla::IngestInventoryPageResponse>, Status> {
        ingest::ingest_inventory_page(self, request).await
    }

    // Reserved wire surface; no backing implementation yet.

    async fn get_power_stats(
        &self,
        _request: Request<rla::ComponentScopeRequest>,
    ) -> Result<Response<rla::PowerStatsResponse>, Status> {
        Err(Status::unimplemented("power stats are not implemented"))
    }

    async fn get_firmware_versions(
        &self,
        _request: Request<rla::ComponentScopeRequest>,
    ) -> Result<Response<rla::FirmwareVersionsResponse>, Status> {
        Err(Status::unimplemented(
            "firmware version queries are not implemented",
        ))
    }
}
