pub mod bulk_importer;
pub mod image_binder;
pub mod product_grouper;
pub mod product_service;
pub mod variant_validator;
