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

//! Conversions between the RLA wire schema and the internal model.

use std::str::FromStr;

use model::component::{Bmc, Component, ComponentType, PowerState};
use model::ids::{ComponentId, NvlDomainId, RackId};
use model::rack::Rack;
use rpc::errors::RpcDataConversionError;
use rpc::rla;

pub fn component_type_from_wire(raw: i32) -> Result<ComponentType, RpcDataConversionError> {
    match rla::ComponentType::try_from(raw) {
        Ok(rla::ComponentType::Unknown) => Ok(ComponentType::Unknown),
        Ok(rla::ComponentType::Compute) => Ok(ComponentType::Compute),
        Ok(rla::ComponentType::NvlSwitch) => Ok(ComponentType::NvlSwitch),
        Ok(rla::ComponentType::PowerShelf) => Ok(ComponentType::PowerShelf),
        Ok(rla::ComponentType::TorSwitch) => Ok(ComponentType::TorSwitch),
        Ok(rla::ComponentType::Ums) => Ok(ComponentType::Ums),
        Ok(rla::ComponentType::Cdu) => Ok(ComponentType::Cdu),
        Err(_) => Err(RpcDataConversionError::InvalidEnumValue(
            "ComponentType",
            raw,
        )),
    }
}

pub fn component_type_to_wire(component_type: ComponentType) -> rla::ComponentType {
    match component_type {
        ComponentType::Unknown => rla::ComponentType::Unknown,
        ComponentType::Compute => rla::ComponentType::Compute,
        ComponentType::NvlSwitch => rla::ComponentType::NvlSwitch,
        ComponentType::PowerShelf => rla::ComponentType::PowerShelf,
        ComponentType::TorSwitch => rla::ComponentType::TorSwitch,
        ComponentType::Ums => rla::ComponentType::Ums,
        ComponentType::Cdu => rla::ComponentType::Cdu,
    }
}

pub fn power_state_from_wire(raw: i32) -> Result<PowerState, RpcDataConversionError> {
    match rla::PowerState::try_from(raw) {
        Ok(rla::PowerState::Unknown) => Ok(PowerState::Unknown),
        Ok(rla::PowerState::On) => Ok(PowerState::On),
        Ok(rla::PowerState::Off) => Ok(PowerState::Off),
        Err(_) => Err(RpcDataConversionError::InvalidEnumValue("PowerState", raw)),
    }
}

pub fn power_state_to_wire(power_state: PowerState) -> rla::PowerState {
    match power_state {
        PowerState::Unknown => rla::PowerState::Unknown,
        PowerState::On => rla::PowerState::On,
        PowerState::Off => rla::PowerState::Off,
    }
}

pub fn rack_id_from_wire(raw: &str) -> Result<RackId, RpcDataConversionError> {
    RackId::from_str(raw)
        .map_err(|_| RpcDataConversionError::InvalidUuid("RackId", raw.to_string()))
}

pub fn component_id_from_wire(raw: &str) -> Result<ComponentId, RpcDataConversionError> {
    ComponentId::from_str(raw)
        .map_err(|_| RpcDataConversionError::InvalidUuid("ComponentId", raw.to_string()))
}

pub fn nvl_domain_id_from_wire(raw: &str) -> Result<NvlDomainId, RpcDataConversionError> {
    NvlDomainId::from_str(raw)
        .map_err(|_| RpcDataConversionError::InvalidUuid("NvlDomainId", raw.to_string()))
}

pub fn rack_to_wire(rack: &Rack) -> rla::Rack {
    rla::Rack {
        id: rack.id.to_string(),
        name: rack.name.clone(),
        manufacturer: rack.manufacturer.clone(),
        serial_number: rack.serial_number.clone(),
        description: rack.description.clone().into_iter().collect(),
        location: rack.location.clone().into_iter().collect(),
        nvl_domain_id: rack.nvl_domain_id.map(|id| id.to_string()),
        status: rack.status.to_string(),
        created_at: rack.created_at.to_rfc3339(),
        updated_at: rack.updated_at.to_rfc3339(),
        ingested_at: rack.ingested_at.map(|t| t.to_rfc3339()),
        components: rack.components.iter().map(component_to_wire).collect(),
    }
}

/// Builds the model rack an incoming create/patch describes. Timestamps and
/// lifecycle fields are server-owned and ignored on the way in; an empty ID
/// mints a fresh one.
pub fn rack_from_wire(wire: &rla::Rack) -> Result<Rack, RpcDataConversionError> {
    let id = if wire.id.is_empty() {
        RackId::new()
    } else {
        rack_id_from_wire(&wire.id)?
    };
    let nvl_domain_id = wire
        .nvl_domain_id
        .as_deref()
        .filter(|raw| !raw.is_empty())
        .map(nvl_domain_id_from_wire)
        .transpose()?;

    Ok(Rack {
        id,
        name: wire.name.clone(),
        manufacturer: wire.manufacturer.clone(),
        serial_number: wire.serial_number.clone(),
        description: wire.description.clone().into_iter().collect(),
        location: wire.location.clone().into_iter().collect(),
        nvl_domain_id,
        ..Default::default()
    })
}

pub fn component_to_wire(component: &Component) -> rla::Component {
    rla::Component {
        id: component.id.to_string(),
        name: component.name.clone(),
        r#type: component_type_to_wire(component.component_type).into(),
        manufacturer: component.manufacturer.clone(),
        serial_number: component.serial_number.clone(),
        model: component.model.clone(),
        description: component.description.clone().into_iter().collect(),
        firmware_version: component.firmware_version.clone(),
        rack_id: component.rack_id.map(|id| id.to_string()),
        slot_id: component.slot_id,
        tray_index: component.tray_index,
        host_id: component.host_id.clone(),
        external_id: component.external_id.clone(),
        power_state: power_state_to_wire(component.power_state).into(),
        bmcs: component
            .bmcs
            .iter()
            .map(|bmc| rla::Bmc {
                mac_address: bmc.mac_address.to_string(),
                ip_address: bmc
                    .ip_address
                    .map(|ip| ip.to_string())
                    .unwrap_or_default(),
            })
            .collect(),
        ingested_at: component.ingested_at.map(|t| t.to_rfc3339()),
    }
}

pub fn component_from_wire(wire: &rla::Component) -> Result<Component, RpcDataConversionError> {
    let id = if wire.id.is_empty() {
        ComponentId::new()
    } else {
        component_id_from_wire(&wire.id)?
    };
    let rack_id = wire
        .rack_id
        .as_deref()
        .filter(|raw| !raw.is_empty())
        .map(rack_id_from_wire)
        .transpose()?;

    let mut bmcs = Vec::with_capacity(wire.bmcs.len());
    for bmc in &wire.bmcs {
        let mac_address = bmc
            .mac_address
            .parse()
            .map_err(|_| RpcDataConversionError::InvalidMacAddress(bmc.mac_address.clone()))?;
        let ip_address = if bmc.ip_address.is_empty() {
            None
        } else {
            Some(bmc.ip_address.parse().map_err(|_| {
                RpcDataConversionError::InvalidIpAddress(bmc.ip_address.clone())
            })?)
        };
        bmcs.push(Bmc {
            mac_address,
            ip_address,
        });
    }

    Ok(Component {
        id,
        name: wire.name.clone(),
        component_type: component_type_from_wire(wire.r#type)?,
        manufacturer: wire.manufacturer.clone(),
        serial_number: wire.serial_number.clone(),
        model: wire.model.clone(),
        description: wire.description.clone().into_iter().collect(),
        firmware_version: wire.firmware_version.clone(),
        rack_id,
        slot_id: wire.slot_id,
        tray_index: wire.tray_index,
        host_id: wire.host_id.clone(),
        external_id: wire.external_id.clone(),
        power_state: power_state_from_wire(wire.power_state)?,
        bmcs,
        ..Default::default()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rack_round_trip() {
        let rack = Rack {
            id: RackId::new(),
            name: "R1".to_string(),
            manufacturer: "NVIDIA".to_string(),
            serial_number: "RACK-SN-001".to_string(),
            description: [("owner".to_string(), "infra".to_string())].into(),
            nvl_domain_id: Some(NvlDomainId::new()),
            ..Default::default()
        };

        let round_tripped = rack_from_wire(&rack_to_wire(&rack)).unwrap();
        assert_eq!(round_tripped.id, rack.id);
        assert_eq!(round_tripped.name, rack.name);
        assert_eq!(round_tripped.serial_number, rack.serial_number);
        assert_eq!(round_tripped.description, rack.description);
        assert_eq!(round_tripped.nvl_domain_id, rack.nvl_domain_id);
    }

    #[test]
    fn test_component_round_trip_with_bmcs() {
        let component = Component {
            id: ComponentId::new(),
            name: "shelf-1".to_string(),
            component_type: ComponentType::PowerShelf,
            manufacturer: "Liteon".to_string(),
            serial_number: "PS-SN-001".to_string(),
            power_state: PowerState::On,
            bmcs: vec![Bmc {
                mac_address: "00:11:22:33:44:55".parse().unwrap(),
                ip_address: Some("192.168.1.100".parse().unwrap()),
            }],
            ..Default::default()
        };

        let round_tripped = component_from_wire(&component_to_wire(&component)).unwrap();
        assert_eq!(round_tripped.id, component.id);
        assert_eq!(round_tripped.component_type, ComponentType::PowerShelf);
        assert_eq!(round_tripped.power_state, PowerState::On);
        assert_eq!(round_tripped.bmcs, component.bmcs);
    }

    #[test]
    fn test_empty_id_mints_fresh_one() {
        let wire = rla::Rack {
            name: "R1".to_string(),
            serial_number: "SN".to_string(),
            ..Default::default()
        };
        let a = rack_from_wire(&wire).unwrap();
        let b = rack_from_wire(&wire).unwrap();
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn test_bad_mac_is_rejected() {
        let wire = rla::Component {
            serial_number: "SN".to_string(),
            bmcs: vec![rla::Bmc {
                mac_address: "nope".to_string(),
                ip_address: String::new(),
            }],
            ..Default::default()
        };
        assert!(matches!(
            component_from_wire(&wire),
            Err(RpcDataConversionError::InvalidMacAddress(_))
        ));
    }
}
