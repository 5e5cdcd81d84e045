use serde::{Deserialize, Serialize};

/// Product row of the catalog. The id is the integer primary key.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Product {
    pub id: i32,
    pub name: String,
    pub like_count: i32,
}

/// Form body of `POST /add_product` and `POST /update_product`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProductForm {
    pub id: i32,
    pub name: String,
    pub like_count: i32,
}

impl From<ProductForm> for Product {
    fn from(value: ProductForm) -> Self {
        Self {
            id: value.id,
            name: value.name,
            like_count: value.like_count,
        }
    }
}

/// Form body of `POST /delete_product`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProductIdForm {
    pub id: i32,
}

/// Form body of `POST /like_product`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LikeProductForm {
    pub product_id: i32,
}
