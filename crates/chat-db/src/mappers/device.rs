//! Device entity <-> model mapper

use chat_core::entities::Device;
use chat_core::error::DomainError;
use chat_core::value_objects::ClientId;

use crate::models::DeviceModel;

impl TryFrom<DeviceModel> for Device {
    type Error = DomainError;

    fn try_from(model: DeviceModel) -> Result<Self, Self::Error> {
        let ip = model.ip.parse().map_err(|_| {
            DomainError::DatabaseError(format!("Stored device address is not an IP: {}", model.ip))
        })?;

        Ok(Device {
            client_id: ClientId::new(model.client_id),
            ip,
            info: model.info,
            logged_in_at: model.logged_in_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn model(ip: &str) -> DeviceModel {
        DeviceModel {
            client_id: 5,
            ip: ip.to_string(),
            info: "laptop".to_string(),
            logged_in_at: Utc::now(),
        }
    }

    #[test]
    fn test_device_from_model() {
        let device = Device::try_from(model("10.0.0.7")).unwrap();
        assert_eq!(device.client_id, ClientId::new(5));
        assert_eq!(device.ip.to_string(), "10.0.0.7");
    }

    #[test]
    fn test_device_bad_ip() {
        assert!(Device::try_from(model("not-an-ip")).is_err());
    }
}
