diesel::table! {
    events (id) {
        id -> Uuid,
        title -> Varchar,
        region -> Varchar,
        delivery_dates -> Array<Text>,
        product_names -> Array<Text>,
        whatsapp_number -> Varchar,
        messenger_id -> Nullable<Varchar>,
        pickup_note -> Varchar,
        status -> Varchar,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    orders (id) {
        id -> Uuid,
        event_id -> Uuid,
        customer_name -> Varchar,
        note -> Varchar,
        quantities -> Jsonb,
        total_items -> Int4,
        status -> Varchar,
        channel -> Varchar,
        delivery_mode -> Varchar,
        delivery_date -> Varchar,
        delivery_time_slot -> Varchar,
        location_link -> Varchar,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    products (id) {
        id -> Uuid,
        name -> Varchar,
        price -> Int4,
        category -> Varchar,
        image_urls -> Array<Text>,
        stock_quantity -> Nullable<Int4>,
        low_stock_threshold -> Nullable<Int4>,
        status -> Varchar,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

diesel::joinable!(orders -> events (event_id));

diesel::allow_tables_to_appear_in_same_query!(
    events,
    orders,
    products,
);
