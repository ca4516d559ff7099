//! Crop market
//!
//! Listings and orders over the row-log store. Seller decisions re-fetch
//! the orders table and mutate status cells in place; only pending orders
//! can be decided, decided ones stay visible.

use crate::auth::UserRecord;
use crate::store::{tables, RowStore, StoreError};
use chrono::Local;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Column order of the `orders` table: order_id, crop, quantity, price,
/// buyer, buyer_email, farmer, status, courier, tracking, expected,
/// delivery.
const STATUS_COLUMN: usize = 8;
const COURIER_COLUMN: usize = 9;
const TRACKING_COLUMN: usize = 10;
const EXPECTED_COLUMN: usize = 11;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Pickup,
    HomeDelivery,
}

impl Delivery {
    fn from_cell(cell: &str) -> Self {
        if cell.trim().eq_ignore_ascii_case("home delivery") {
            Delivery::HomeDelivery
        } else {
            Delivery::Pickup
        }
    }
}

impl fmt::Display for Delivery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Delivery::Pickup => write!(f, "Pickup"),
            Delivery::HomeDelivery => write!(f, "Home Delivery"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrderStatus {
    Pending,
    AcceptedPickup,
    AcceptedCourier,
    AcceptedHomeDelivery,
    Rejected,
}

impl OrderStatus {
    fn from_cell(cell: &str) -> Self {
        match cell.trim() {
            "Accepted (Pickup)" => OrderStatus::AcceptedPickup,
            "Accepted (Courier)" => OrderStatus::AcceptedCourier,
            "Accepted (Home Delivery)" => OrderStatus::AcceptedHomeDelivery,
            "Rejected" => OrderStatus::Rejected,
            _ => OrderStatus::Pending,
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, OrderStatus::Pending)
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderStatus::Pending => write!(f, "Pending"),
            OrderStatus::AcceptedPickup => write!(f, "Accepted (Pickup)"),
            OrderStatus::AcceptedCourier => write!(f, "Accepted (Courier)"),
            OrderStatus::AcceptedHomeDelivery => write!(f, "Accepted (Home Delivery)"),
            OrderStatus::Rejected => write!(f, "Rejected"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Listing {
    pub farmer: String,
    pub crop: String,
    pub quantity: u32,
    pub price: u32,
    pub location: String,
    pub phone: String,
    pub email: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Order {
    pub order_id: String,
    pub crop: String,
    pub quantity: u32,
    pub price: u32,
    pub buyer: String,
    pub buyer_email: String,
    pub farmer: String,
    pub status: OrderStatus,
    pub courier: String,
    pub tracking: String,
    pub expected: String,
    pub delivery: Delivery,
}

/// How a seller settles a pending order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    AcceptPickup,
    AcceptDirect,
    AcceptCourier {
        company: String,
        tracking: String,
        expected: String,
    },
    Reject,
}

#[derive(Debug, Error)]
pub enum MarketError {
    #[error("name the crop and give a non-zero quantity and price")]
    InvalidListing,
    #[error(transparent)]
    Store(#[from] StoreError),
}

pub struct Market {
    store: Arc<dyn RowStore>,
}

impl Market {
    pub fn new(store: Arc<dyn RowStore>) -> Self {
        Self { store }
    }

    /// Post a crop for sale. Contact details come from the seller's record.
    pub async fn post_listing(
        &self,
        seller: &UserRecord,
        crop: &str,
        quantity: u32,
        price: u32,
    ) -> Result<(), MarketError> {
        let crop = crop.trim();
        if crop.is_empty() || quantity == 0 || price == 0 {
            return Err(MarketError::InvalidListing);
        }

        self.store
            .append(
                tables::CROPS,
                vec![
                    seller.username.clone(),
                    crop.to_string(),
                    quantity.to_string(),
                    price.to_string(),
                    seller.address.clone(),
                    seller.phone.clone(),
                    seller.email.clone(),
                ],
            )
            .await?;
        tracing::debug!("[Market] '{}' listed {} kg of {}", seller.username, quantity, crop);
        Ok(())
    }

    pub async fn listings(&self) -> Result<Vec<Listing>, StoreError> {
        let rows = self.store.rows(tables::CROPS).await?;
        Ok(rows.iter().map(|r| parse_listing(r)).collect())
    }

    /// Place an order against a listing. The order id is the wall clock
    /// down to microseconds, which doubles as a rough creation stamp.
    pub async fn place_order(
        &self,
        listing: &Listing,
        buyer: &UserRecord,
        delivery: Delivery,
    ) -> Result<String, StoreError> {
        let order_id = Local::now().format("%Y%m%d%H%M%S%6f").to_string();
        self.store
            .append(
                tables::ORDERS,
                vec![
                    order_id.clone(),
                    listing.crop.clone(),
                    listing.quantity.to_string(),
                    listing.price.to_string(),
                    buyer.username.clone(),
                    buyer.email.clone(),
                    listing.farmer.clone(),
                    OrderStatus::Pending.to_string(),
                    String::new(),
                    String::new(),
                    String::new(),
                    delivery.to_string(),
                ],
            )
            .await?;
        tracing::debug!(
            "[Market] Order {} placed by '{}' with '{}'",
            order_id,
            buyer.username,
            listing.farmer
        );
        Ok(order_id)
    }

    pub async fn orders_for_buyer(&self, username: &str) -> Result<Vec<Order>, StoreError> {
        let rows = self.store.rows(tables::ORDERS).await?;
        Ok(rows
            .iter()
            .map(|r| parse_order(r))
            .filter(|o| o.buyer == username)
            .collect())
    }

    /// Every order addressed to this farmer, decided or not.
    pub async fn sales_for_farmer(&self, username: &str) -> Result<Vec<Order>, StoreError> {
        let rows = self.store.rows(tables::ORDERS).await?;
        Ok(rows
            .iter()
            .map(|r| parse_order(r))
            .filter(|o| o.farmer == username)
            .collect())
    }

    pub async fn pending_sales(&self, username: &str) -> Result<Vec<Order>, StoreError> {
        Ok(self
            .sales_for_farmer(username)
            .await?
            .into_iter()
            .filter(|o| o.status.is_pending())
            .collect())
    }

    /// Settle a pending order. The row index is recomputed from a fresh
    /// fetch; a missing or already-decided order returns false.
    pub async fn decide(&self, order_id: &str, decision: Decision) -> Result<bool, StoreError> {
        let rows = self.store.rows(tables::ORDERS).await?;
        let found = rows
            .iter()
            .enumerate()
            .find(|(_, r)| r.first().map(String::as_str) == Some(order_id));

        let (index, row) = match found {
            Some(hit) => hit,
            None => return Ok(false),
        };
        if !parse_order(row).status.is_pending() {
            return Ok(false);
        }

        let row_index = index + 1;
        match decision {
            Decision::AcceptPickup => {
                self.set_status(row_index, OrderStatus::AcceptedPickup).await?;
            }
            Decision::AcceptDirect => {
                self.set_status(row_index, OrderStatus::AcceptedHomeDelivery)
                    .await?;
            }
            Decision::AcceptCourier {
                company,
                tracking,
                expected,
            } => {
                self.set_status(row_index, OrderStatus::AcceptedCourier).await?;
                self.store
                    .update_cell(tables::ORDERS, row_index, COURIER_COLUMN, &company)
                    .await?;
                self.store
                    .update_cell(tables::ORDERS, row_index, TRACKING_COLUMN, &tracking)
                    .await?;
                self.store
                    .update_cell(tables::ORDERS, row_index, EXPECTED_COLUMN, &expected)
                    .await?;
            }
            Decision::Reject => {
                self.set_status(row_index, OrderStatus::Rejected).await?;
            }
        }
        tracing::debug!("[Market] Order {} decided", order_id);
        Ok(true)
    }

    async fn set_status(&self, row_index: usize, status: OrderStatus) -> Result<(), StoreError> {
        self.store
            .update_cell(tables::ORDERS, row_index, STATUS_COLUMN, &status.to_string())
            .await
    }
}

fn parse_listing(row: &[String]) -> Listing {
    let cell = |i: usize| row.get(i).cloned().unwrap_or_default();
    Listing {
        farmer: cell(0),
        crop: cell(1),
        quantity: cell(2).trim().parse().unwrap_or(0),
        price: cell(3).trim().parse().unwrap_or(0),
        location: cell(4),
        phone: cell(5),
        email: cell(6),
    }
}

fn parse_order(row: &[String]) -> Order {
    let cell = |i: usize| row.get(i).cloned().unwrap_or_default();
    Order {
        order_id: cell(0),
        crop: cell(1),
        quantity: cell(2).trim().parse().unwrap_or(0),
        price: cell(3).trim().parse().unwrap_or(0),
        buyer: cell(4),
        buyer_email: cell(5),
        farmer: cell(6),
        status: OrderStatus::from_cell(&cell(7)),
        courier: cell(8),
        tracking: cell(9),
        expected: cell(10),
        delivery: Delivery::from_cell(&cell(11)),
    }
}
