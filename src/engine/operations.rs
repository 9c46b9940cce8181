use rust_decimal::Decimal;

use super::{
    require_field, require_positive, CancelRequest, IntakeRequest, InventoryEngine,
    InventoryError, Receipt, ReceiveRequest, RelocateRequest, SaleRequest, TransferOutRequest,
};
use crate::context::RequestContext;
use crate::ledger::{Claim, PendingEntry};
use crate::mutator::DeltaOutcome;
use crate::normalize::normalize;
use crate::schema::{OperationType, PendingTransfer};

impl InventoryEngine {
    /// Add stock to (key, rack), creating the row on first intake.
    pub fn intake(
        &self,
        ctx: &RequestContext,
        req: &IntakeRequest,
    ) -> Result<Receipt, InventoryError> {
        self.observe("intake", &req.location, ctx, || {
            self.require_location(&req.location)?;
            require_field("Key", &req.key)?;
            require_field("Rack", &req.rack)?;
            require_positive(req.quantity)?;

            let now = self.clock.timestamp();
            let added = self.delta(
                "intake: credit stock",
                &req.location,
                &req.key,
                &req.rack,
                &req.display_name,
                req.quantity,
                &now,
            )?;

            let audit = !self.record_intake
                || self.record_movement(
                    ctx,
                    self.movement(
                        ctx,
                        &now,
                        &req.location,
                        &added.key,
                        OperationType::Intake,
                        format!("Intake into rack {}", added.rack),
                        req.quantity,
                        Decimal::ZERO,
                    ),
                );
            let verb = if added.created { "Registered" } else { "Added" };
            Ok(Receipt::new(
                format!(
                    "{verb} {} x {} in rack {} at {}; {} in stock.",
                    req.quantity,
                    added.key,
                    added.rack,
                    req.location.trim(),
                    added.resulting
                ),
                audit,
            ))
        })
    }

    /// Write off stock sold or installed.
    pub fn sell(&self, ctx: &RequestContext, req: &SaleRequest) -> Result<Receipt, InventoryError> {
        self.observe("sell", &req.location, ctx, || {
            self.require_location(&req.location)?;
            require_field("Key", &req.key)?;
            require_field("Rack", &req.rack)?;
            require_positive(req.quantity)?;
            if req.price.is_sign_negative() {
                return Err(InventoryError::validation(format!(
                    "Price cannot be negative (got {}).",
                    req.price
                )));
            }

            let now = self.clock.timestamp();
            let sold = self.delta(
                "sell: debit stock",
                &req.location,
                &req.key,
                &req.rack,
                "",
                -req.quantity,
                &now,
            )?;

            let detail = match req.detail.trim() {
                "" => format!("Sale from rack {}", sold.rack),
                detail => format!("{detail} (from rack {})", sold.rack),
            };
            let audit = self.record_movement(
                ctx,
                self.movement(
                    ctx,
                    &now,
                    &req.location,
                    &sold.key,
                    OperationType::Sale,
                    detail,
                    req.quantity,
                    req.price,
                ),
            );
            Ok(Receipt::new(
                format!(
                    "Sold {} x {} from rack {}; {} left.",
                    req.quantity, sold.key, sold.rack, sold.resulting
                ),
                audit,
            ))
        })
    }

    /// Debit the origin and put the stock in transit to `destination`.
    pub fn transfer_out(
        &self,
        ctx: &RequestContext,
        req: &TransferOutRequest,
    ) -> Result<Receipt, InventoryError> {
        self.observe("transfer_out", &req.origin, ctx, || {
            self.require_location(&req.origin)?;
            self.require_location(&req.destination)?;
            require_field("Key", &req.key)?;
            require_field("Rack", &req.rack)?;
            require_positive(req.quantity)?;
            let origin = req.origin.trim();
            let destination = req.destination.trim();
            if origin == destination {
                return Err(InventoryError::validation(format!(
                    "Origin and destination are both {origin}."
                )));
            }

            let now = self.clock.timestamp();
            let sent = self.delta(
                "transfer out: debit origin",
                origin,
                &req.key,
                &req.rack,
                "",
                -req.quantity,
                &now,
            )?;

            let transfer = PendingTransfer {
                created_at: now.clone(),
                key: sent.key.clone(),
                display_name: sent.display_name.clone(),
                quantity: req.quantity,
                origin: origin.to_string(),
                destination: destination.to_string(),
            };
            let ledger = self.ledger();
            if let Err(failure) =
                ledger.append_pending_once(&transfer, &transfer.to_row(), &self.retry)
            {
                self.settle(
                    "transfer_out",
                    failure,
                    format!(
                        "Deducted {} x {} from rack {} at {origin}",
                        req.quantity, sent.key, sent.rack
                    ),
                    || {
                        self.retry
                            .run("verify pending transfer", || ledger.find(&transfer))
                            .map(|found| found.map(|_| ()))
                    },
                    || {
                        self.delta(
                            "transfer out: restore origin",
                            origin,
                            &sent.key,
                            &sent.rack,
                            "",
                            req.quantity,
                            &now,
                        )
                        .map(|_| ())
                    },
                )?;
            }

            let audit = self.record_movement(
                ctx,
                self.movement(
                    ctx,
                    &now,
                    origin,
                    &sent.key,
                    OperationType::TransferOut,
                    format!("Sent to {destination} from rack {}", sent.rack),
                    req.quantity,
                    Decimal::ZERO,
                ),
            );
            Ok(Receipt::new(
                format!(
                    "Sent {} x {} from rack {} to {destination}; {} left at {origin}.",
                    req.quantity, sent.key, sent.rack, sent.resulting
                ),
                audit,
            ))
        })
    }

    /// Accept an in-transit transfer into `rack` at its destination.
    pub fn receive(
        &self,
        ctx: &RequestContext,
        req: &ReceiveRequest,
    ) -> Result<Receipt, InventoryError> {
        self.observe("receive", &req.destination, ctx, || {
            self.require_location(&req.destination)?;
            require_field("Rack", &req.rack)?;
            let destination = req.destination.trim();
            let before = self.stock_level(destination, &req.transfer.key, &req.rack)?;

            let entry = self.claim_transfer(&req.transfer, |stored| {
                if stored.destination != destination {
                    return Err(InventoryError::validation(format!(
                        "The transfer of {} is addressed to {}, not {destination}.",
                        stored.key, stored.destination
                    )));
                }
                Ok(())
            })?;
            let transfer = &entry.transfer;

            let now = self.clock.timestamp();
            let received = match self.delta(
                "receive: credit destination",
                destination,
                &transfer.key,
                &req.rack,
                &transfer.display_name,
                transfer.quantity,
                &now,
            ) {
                Ok(received) => received,
                Err(failure) => self.unclaim("receive", failure, &entry, || {
                    self.credit_landed(
                        destination,
                        &transfer.key,
                        &req.rack,
                        before,
                        transfer.quantity,
                    )
                })?,
            };

            let audit = self.record_movement(
                ctx,
                self.movement(
                    ctx,
                    &now,
                    destination,
                    &transfer.key,
                    OperationType::TransferIn,
                    format!("Received from {} into rack {}", transfer.origin, received.rack),
                    transfer.quantity,
                    Decimal::ZERO,
                ),
            );
            Ok(Receipt::new(
                format!(
                    "Received {} x {} from {} into rack {}; {} in stock.",
                    transfer.quantity,
                    transfer.key,
                    transfer.origin,
                    received.rack,
                    received.resulting
                ),
                audit,
            ))
        })
    }

    /// Move stock between two racks of the same location.
    pub fn relocate(
        &self,
        ctx: &RequestContext,
        req: &RelocateRequest,
    ) -> Result<Receipt, InventoryError> {
        self.observe("relocate", &req.location, ctx, || {
            self.require_location(&req.location)?;
            require_field("Key", &req.key)?;
            require_field("Source rack", &req.rack_from)?;
            require_field("Destination rack", &req.rack_to)?;
            require_positive(req.quantity)?;
            let rack_from = normalize(&req.rack_from);
            let rack_to = normalize(&req.rack_to);
            if rack_from == rack_to {
                return Err(InventoryError::validation(format!(
                    "Source and destination rack are both {rack_from}."
                )));
            }

            let before = self.stock_level(&req.location, &req.key, &rack_to)?;
            let now = self.clock.timestamp();
            let moved_out = self.delta(
                "relocate: debit source rack",
                &req.location,
                &req.key,
                &rack_from,
                "",
                -req.quantity,
                &now,
            )?;

            let display_name = match req.display_name.trim() {
                "" => moved_out.display_name.as_str(),
                name => name,
            };
            let moved_in = match self.delta(
                "relocate: credit destination rack",
                &req.location,
                &req.key,
                &rack_to,
                display_name,
                req.quantity,
                &now,
            ) {
                Ok(moved_in) => moved_in,
                Err(failure) => self.settle(
                    "relocate",
                    failure,
                    format!(
                        "Deducted {} x {} from rack {rack_from}",
                        req.quantity, moved_out.key
                    ),
                    || self.credit_landed(&req.location, &req.key, &rack_to, before, req.quantity),
                    || {
                        self.delta(
                            "relocate: restore source rack",
                            &req.location,
                            &moved_out.key,
                            &rack_from,
                            "",
                            req.quantity,
                            &now,
                        )
                        .map(|_| ())
                    },
                )?,
            };

            let audit = self.record_movement(
                ctx,
                self.movement(
                    ctx,
                    &now,
                    &req.location,
                    &moved_out.key,
                    OperationType::Relocation,
                    format!("Moved from rack {rack_from} to rack {rack_to}"),
                    req.quantity,
                    Decimal::ZERO,
                ),
            );
            Ok(Receipt::new(
                format!(
                    "Moved {} x {} from rack {rack_from} ({} left) to rack {rack_to} ({} now).",
                    req.quantity, moved_out.key, moved_out.resulting, moved_in.resulting
                ),
                audit,
            ))
        })
    }

    /// Call back an in-transit transfer and return the stock to the origin.
    pub fn cancel_transfer(
        &self,
        ctx: &RequestContext,
        req: &CancelRequest,
    ) -> Result<Receipt, InventoryError> {
        self.observe("cancel_transfer", &req.origin, ctx, || {
            self.require_location(&req.origin)?;
            require_field("Return rack", &req.return_rack)?;
            let origin = req.origin.trim();
            let before = self.stock_level(origin, &req.transfer.key, &req.return_rack)?;

            let entry = self.claim_transfer(&req.transfer, |stored| {
                if stored.origin != origin {
                    return Err(InventoryError::validation(format!(
                        "The transfer of {} was sent from {}, not {origin}.",
                        stored.key, stored.origin
                    )));
                }
                Ok(())
            })?;
            let transfer = &entry.transfer;

            let now = self.clock.timestamp();
            let returned = match self.delta(
                "cancel: credit origin",
                origin,
                &transfer.key,
                &req.return_rack,
                &transfer.display_name,
                transfer.quantity,
                &now,
            ) {
                Ok(returned) => returned,
                Err(failure) => self.unclaim("cancel_transfer", failure, &entry, || {
                    self.credit_landed(
                        origin,
                        &transfer.key,
                        &req.return_rack,
                        before,
                        transfer.quantity,
                    )
                })?,
            };

            let audit = self.record_movement(
                ctx,
                self.movement(
                    ctx,
                    &now,
                    origin,
                    &transfer.key,
                    OperationType::TransferCancel,
                    format!(
                        "Cancelled transfer to {}; returned to rack {}",
                        transfer.destination, returned.rack
                    ),
                    transfer.quantity,
                    Decimal::ZERO,
                ),
            );
            Ok(Receipt::new(
                format!(
                    "Cancelled the transfer of {} x {} to {}; returned to rack {} ({} in stock).",
                    transfer.quantity,
                    transfer.key,
                    transfer.destination,
                    returned.rack,
                    returned.resulting
                ),
                audit,
            ))
        })
    }

    /// Re-validate `held` against the pending sheet and take it off the sheet.
    ///
    /// `check` sees the stored row before anything is deleted. Whoever
    /// deletes the row first owns the transfer; everyone else gets
    /// [`InventoryError::AlreadyResolved`].
    fn claim_transfer(
        &self,
        held: &PendingTransfer,
        check: impl FnOnce(&PendingTransfer) -> Result<(), InventoryError>,
    ) -> Result<PendingEntry, InventoryError> {
        require_field("Transfer timestamp", &held.created_at)?;
        require_field("Transfer key", &held.key)?;
        let resolved = || InventoryError::AlreadyResolved {
            key: normalize(&held.key),
            created_at: held.created_at.trim().to_string(),
        };

        let ledger = self.ledger();
        let Some(entry) = self
            .retry
            .run("re-check pending transfer", || ledger.find(held))?
        else {
            return Err(resolved());
        };
        check(&entry.transfer)?;
        if entry.transfer.quantity <= 0 {
            return Err(InventoryError::validation(format!(
                "The pending transfer of {} has no quantity to move.",
                entry.transfer.key
            )));
        }

        match ledger.claim(&entry.raw, &self.retry)? {
            Claim::Claimed => Ok(entry),
            Claim::Gone => Err(resolved()),
            Claim::Uncertain => {
                log::error!(
                    "pending transfer {} {} removed without confirmation; no stock was credited",
                    entry.transfer.created_at,
                    entry.transfer.key
                );
                Err(InventoryError::PartialFailure {
                    applied: format!(
                        "The pending transfer of {} x {} sent {} is no longer listed \
                         and no stock was credited",
                        entry.transfer.quantity, entry.transfer.key, entry.transfer.created_at
                    ),
                    failure: Box::new(resolved()),
                })
            }
        }
    }

    /// Put a claimed pending row back after the stock credit failed, unless
    /// the credit turns out to have landed.
    fn unclaim(
        &self,
        operation: &'static str,
        failure: InventoryError,
        entry: &PendingEntry,
        landed: impl FnOnce() -> Result<Option<DeltaOutcome>, InventoryError>,
    ) -> Result<DeltaOutcome, InventoryError> {
        self.settle(
            operation,
            failure,
            format!(
                "Took the transfer of {} x {} off the pending list",
                entry.transfer.quantity, entry.transfer.key
            ),
            landed,
            || {
                self.ledger()
                    .append_pending_once(&entry.transfer, &entry.raw, &self.retry)
            },
        )
    }
}
