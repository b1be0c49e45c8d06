use std::collections::HashMap;

use async_trait::async_trait;
use aws_sdk_dynamodb::types::AttributeValue;
use aws_sdk_dynamodb::Client as DynamoClient;

use super::model::{User, DEFAULT_AVATAR};
use crate::error::StoreError;
use crate::listings::repository::string_attr;

#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn create(&self, user: &User) -> Result<(), StoreError>;

    async fn find_by_id(&self, user_id: &str) -> Result<Option<User>, StoreError>;

    async fn update(&self, user: &User) -> Result<User, StoreError>;

    async fn delete_by_id(&self, user_id: &str) -> Result<(), StoreError>;
}

/// Users in the shared table: PK = SK = "USER#{cognito-sub}"
pub struct DynamoUserRepository {
    client: DynamoClient,
    table_name: String,
}

impl DynamoUserRepository {
    pub fn new(client: DynamoClient, table_name: impl Into<String>) -> Self {
        Self {
            client,
            table_name: table_name.into(),
        }
    }

    async fn put(&self, user: &User, condition: &str) -> Result<(), StoreError> {
        let result = self
            .client
            .put_item()
            .table_name(&self.table_name)
            .set_item(Some(user_to_item(user)))
            .condition_expression(condition)
            .send()
            .await;

        match result {
            Ok(_) => Ok(()),
            Err(e)
                if e.as_service_error()
                    .map(|se| se.is_conditional_check_failed_exception())
                    .unwrap_or(false) =>
            {
                Err(StoreError::NotFound)
            }
            Err(e) => Err(StoreError::dynamo(e)),
        }
    }
}

fn user_key(user_id: &str) -> String {
    format!("USER#{}", user_id)
}

#[async_trait]
impl UserRepository for DynamoUserRepository {
    /// Store user after Cognito signup
    async fn create(&self, user: &User) -> Result<(), StoreError> {
        self.client
            .put_item()
            .table_name(&self.table_name)
            .set_item(Some(user_to_item(user)))
            .send()
            .await
            .map_err(|e| StoreError::Dynamo(format!("DynamoDB put_item error: {}", e)))?;
        Ok(())
    }

    async fn find_by_id(&self, user_id: &str) -> Result<Option<User>, StoreError> {
        let pk = user_key(user_id);

        let result = self
            .client
            .get_item()
            .table_name(&self.table_name)
            .key("PK", AttributeValue::S(pk.clone()))
            .key("SK", AttributeValue::S(pk))
            .send()
            .await
            .map_err(|e| StoreError::Dynamo(format!("DynamoDB get_item error: {}", e)))?;

        Ok(result.item().map(|item| user_from_item(user_id, item)))
    }

    async fn update(&self, user: &User) -> Result<User, StoreError> {
        self.put(user, "attribute_exists(SK)").await?;
        Ok(user.clone())
    }

    async fn delete_by_id(&self, user_id: &str) -> Result<(), StoreError> {
        let pk = user_key(user_id);
        self.client
            .delete_item()
            .table_name(&self.table_name)
            .key("PK", AttributeValue::S(pk.clone()))
            .key("SK", AttributeValue::S(pk))
            .send()
            .await
            .map_err(|e| StoreError::Dynamo(format!("DynamoDB delete_item error: {}", e)))?;
        Ok(())
    }
}

fn user_to_item(user: &User) -> HashMap<String, AttributeValue> {
    let pk = user_key(&user.user_id);
    let mut item = HashMap::from([
        ("PK".to_string(), AttributeValue::S(pk.clone())),
        ("SK".to_string(), AttributeValue::S(pk)),
        ("user_name".to_string(), AttributeValue::S(user.user_name.clone())),
        ("user_email".to_string(), AttributeValue::S(user.user_email.clone())),
        ("login_name".to_string(), AttributeValue::S(user.login_name.clone())),
        ("avatar".to_string(), AttributeValue::S(user.avatar.clone())),
        ("user_created_at".to_string(), AttributeValue::S(user.user_created_at.clone())),
    ]);
    if let Some(public_id) = &user.avatar_public_id {
        item.insert("avatar_public_id".to_string(), AttributeValue::S(public_id.clone()));
    }
    item
}

fn user_from_item(user_id: &str, item: &HashMap<String, AttributeValue>) -> User {
    let user_email = string_attr(item, "user_email");
    let mut user_name = string_attr(item, "user_name");
    if user_name.trim().is_empty() {
        user_name = user_email.split('@').next().unwrap_or("User").to_string();
    }
    let mut avatar = string_attr(item, "avatar");
    if avatar.is_empty() {
        avatar = DEFAULT_AVATAR.to_string();
    }

    User {
        user_id: user_id.to_string(),
        user_name,
        login_name: string_attr(item, "login_name"),
        user_email,
        avatar,
        avatar_public_id: item
            .get("avatar_public_id")
            .and_then(|v| v.as_s().ok())
            .map(|s| s.to_string()),
        user_created_at: string_attr(item, "user_created_at"),
    }
}
