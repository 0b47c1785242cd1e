//! Uniform ownership check for user-owned resources.

use crate::error::{AccountError, Result};
use crate::models::{DriveFile, Product};
use uuid::Uuid;

/// A record that belongs to exactly one user
pub trait Owned {
    /// Human-readable kind used in error messages
    const KIND: &'static str;

    fn owner_id(&self) -> Uuid;
}

impl Owned for Product {
    const KIND: &'static str = "Product";

    fn owner_id(&self) -> Uuid {
        self.user_id
    }
}

impl Owned for DriveFile {
    const KIND: &'static str = "File";

    fn owner_id(&self) -> Uuid {
        self.user_id
    }
}

/// `Forbidden` unless `caller` owns `resource`
pub fn ensure_owner<T: Owned>(resource: &T, caller: Uuid) -> Result<()> {
    if resource.owner_id() != caller {
        return Err(AccountError::Forbidden(format!(
            "You are not the owner of this {}",
            T::KIND.to_lowercase()
        )));
    }
    Ok(())
}

/// Unwrap a lookup result, mapping absence to `NotFound`
pub fn found<T: Owned>(resource: Option<T>) -> Result<T> {
    resource.ok_or_else(|| AccountError::NotFound(format!("{} not found", T::KIND)))
}

/// Load-then-check in one step for mutate/delete paths
pub fn owned_by<T: Owned>(resource: Option<T>, caller: Uuid) -> Result<T> {
    let resource = found(resource)?;
    ensure_owner(&resource, caller)?;
    Ok(resource)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::FileType;
    use chrono::Utc;

    fn file(owner: Uuid) -> DriveFile {
        DriveFile {
            id: Uuid::new_v4(),
            name: "holiday.png".to_string(),
            file_type: FileType::Image,
            link: "https://files.example.com/holiday.png".to_string(),
            user_id: owner,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_owner_passes() {
        let owner = Uuid::new_v4();
        assert!(ensure_owner(&file(owner), owner).is_ok());
    }

    #[test]
    fn test_other_user_is_forbidden() {
        let err = owned_by(Some(file(Uuid::new_v4())), Uuid::new_v4()).unwrap_err();
        assert!(matches!(err, AccountError::Forbidden(msg) if msg.contains("file")));
    }

    #[test]
    fn test_missing_resource_is_not_found() {
        let err = owned_by::<DriveFile>(None, Uuid::new_v4()).unwrap_err();
        assert!(matches!(err, AccountError::NotFound(msg) if msg == "File not found"));
    }
}
