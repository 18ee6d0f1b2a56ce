//! Seed data script - populates the database with demo sales documents
//!
//! Run with: cargo run --bin seed-data
//!
//! This creates:
//! - 6 products with stock
//! - 3 clients
//! - 4 quotes, one of them remissioned into an order and delivery note
//! - 2 direct orders, one of them delivered
//!
//! It also prints an admin bearer token for exploring the API.

use rust_decimal_macros::dec;
use std::sync::Arc;
use tracing::info;

use ventas_api::{
    auth::{self, AuthConfig, AuthService, TokenSubject},
    config,
    db,
    entities::{client, product},
    services::{
        catalog::{ClientService, ClientSnapshot, CreateProductRequest, ProductService},
        conversions::{ConversionService, RemissionRequest},
        orders::{CreateOrderRequest, OrderItemInput, OrderService},
        quotes::{CreateQuoteRequest, QuoteItemInput, QuoteService},
    },
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    info!("=== Ventas API Seed Data ===");

    let cfg = config::load_config()?;
    let db_pool = db::establish_connection_with_config(&db::DbConfig::from(&cfg)).await?;
    db::run_migrations(&db_pool).await?;
    let db = Arc::new(db_pool);
    info!("Connected to {}", cfg.database_url);

    info!("Creating products...");
    let products = create_products(&db).await?;
    info!("  Created {} products", products.len());

    info!("Creating clients...");
    let clients = create_clients(&db).await?;
    info!("  Created {} clients", clients.len());

    let quotes = QuoteService::new(db.clone(), None).with_retention(cfg.quote_retention());
    let orders = OrderService::new(db.clone(), None).with_code_width(cfg.code_padding);
    let conversions = ConversionService::new(db.clone(), None)
        .with_code_width(cfg.code_padding)
        .with_remission_source_states(cfg.remission_source_states());

    info!("Creating quotes...");
    let mut quote_codes = Vec::new();
    for (i, client) in clients.iter().cycle().take(4).enumerate() {
        let items = products
            .iter()
            .skip(i)
            .take(2)
            .map(|p| QuoteItemInput {
                product_id: p.id,
                product_name: None,
                quantity: 2 + i as i32,
                unit_price: Some(p.price),
                unit_value: None,
                discount: Some(if i % 2 == 0 { dec!(0) } else { dec!(10) }),
            })
            .collect();
        let quote = quotes
            .create_quote(
                CreateQuoteRequest {
                    client_id: Some(client.id),
                    client: None,
                    items,
                    observations: Some("Precios válidos por 15 días".to_string()),
                },
                None,
            )
            .await?;
        quote_codes.push((quote.id, quote.code));
    }
    info!("  Created quotes {:?}", quote_codes.iter().map(|(_, c)| c).collect::<Vec<_>>());

    if let Some((quote_id, code)) = quote_codes.first() {
        let result = conversions
            .remission_quote(*quote_id, RemissionRequest::default(), None)
            .await?;
        info!(
            "  Remissioned {} into {} / {}",
            code, result.order.order_number, result.delivery_note.number
        );
    }

    info!("Creating direct orders...");
    for (i, client) in clients.iter().take(2).enumerate() {
        let order = orders
            .create_order(
                CreateOrderRequest {
                    client_id: Some(client.id),
                    items: vec![OrderItemInput {
                        product_id: products[i].id,
                        quantity: 3,
                        unit_price: None,
                    }],
                    delivery_date: None,
                    observation: None,
                },
                None,
            )
            .await?;
        if i == 0 {
            let transition = orders.mark_delivered(order.id).await?;
            info!(
                "  {} delivered, sale total {:?}",
                transition.order.order_number,
                transition.sale.map(|s| s.total)
            );
        } else {
            info!("  {} scheduled", order.order_number);
        }
    }

    let auth = AuthService::new(AuthConfig::from(&cfg));
    let token = auth.generate_token(&TokenSubject {
        user_id: uuid::Uuid::new_v4(),
        name: Some("Administrador".to_string()),
        email: None,
        roles: vec![auth::ADMIN_ROLE.to_string()],
        permissions: auth::consts::ALL.iter().map(|p| p.to_string()).collect(),
    })?;

    info!("=== Seed Data Complete ===");
    info!("Admin token: {}", token);
    info!("Try: curl -H 'Authorization: Bearer <token>' http://localhost:8080/api/v1/quotes");
    info!("Or explore interactively at: http://localhost:8080/swagger-ui");

    Ok(())
}

async fn create_products(db: &Arc<db::DbPool>) -> anyhow::Result<Vec<product::Model>> {
    let service = ProductService::new(db.clone());
    let catalog = [
        ("Cemento gris 50kg", "CEM-50", dec!(32.50), 400),
        ("Varilla corrugada 3/8", "VAR-38", dec!(18.90), 1200),
        ("Block de concreto 15x20x40", "BLK-15", dec!(12.00), 3000),
        ("Arena fina m3", "ARE-M3", dec!(350.00), 40),
        ("Grava 3/4 m3", "GRA-34", dec!(380.00), 35),
        ("Alambre recocido kg", "ALR-KG", dec!(42.00), 250),
    ];

    let mut products = Vec::with_capacity(catalog.len());
    for (name, code, price, stock) in catalog {
        products.push(
            service
                .create(CreateProductRequest {
                    name: name.to_string(),
                    code: Some(code.to_string()),
                    description: None,
                    price,
                    stock,
                })
                .await?,
        );
    }
    Ok(products)
}

async fn create_clients(db: &Arc<db::DbPool>) -> anyhow::Result<Vec<client::Model>> {
    let service = ClientService::new(db.clone());
    let data = [
        ("Constructora del Valle", "compras@delvalle.example", "Guadalajara"),
        ("Ferretería La Esquina", "pedidos@laesquina.example", "Zapopan"),
        ("Obras y Proyectos Norte", "obra@proyectosnorte.example", "Monterrey"),
    ];

    let mut clients = Vec::with_capacity(data.len());
    for (name, email, city) in data {
        clients.push(
            service
                .create(ClientSnapshot {
                    name: name.to_string(),
                    email: Some(email.to_string()),
                    phone: None,
                    city: Some(city.to_string()),
                    address: None,
                })
                .await?,
        );
    }
    Ok(clients)
}
