//! Trade queue: enqueueing deferred work and draining it in bounded batches.

use crate::*;
use frame::prelude::*;
use polkadot_sdk::frame_support::storage::with_storage_layer;
use polkadot_sdk::sp_runtime::traits::Saturating;

impl<T: Config> Pallet<T> {
  fn cooldown_from_now() -> BlockNumberFor<T> {
    frame_system::Pallet::<T>::block_number().saturating_add(T::RetryCooldown::get())
  }

  /// Append a new operation, eligible one cooldown from now
  pub(crate) fn enqueue(
    initiator: &T::AccountId,
    kind: OperationKind,
    reason: DeferralReason,
    asset_in: AssetKind,
    asset_out: AssetKind,
    amount_in: Balance,
  ) -> Result<OperationId, DispatchError> {
    let id = NextOperationId::<T>::mutate(|next| {
      let id = *next;
      *next = next.wrapping_add(1);
      id
    });
    let next_eligible = Self::cooldown_from_now();
    let operation = QueuedOperation {
      id,
      initiator: initiator.clone(),
      asset_in,
      asset_out,
      amount_in,
      kind,
      retry_count: 0,
      next_eligible,
      reason,
    };
    TradeQueue::<T>::try_mutate(|queue| queue.try_push(operation))
      .map_err(|_| Error::<T>::QueueFull)?;

    log::debug!(
      target: LOG_TARGET,
      "queued operation {} ({:?}, {:?}) until block {:?}",
      id,
      kind,
      reason,
      next_eligible
    );
    Self::deposit_event(Event::OperationQueued {
      id,
      initiator: initiator.clone(),
      kind,
      reason,
      asset_in,
      asset_out,
      amount_in,
      next_eligible,
    });
    Ok(id)
  }

  /// Drain up to `limit` entries.
  ///
  /// Only completions and drops count toward `limit`. Entries still inside their cooldown are
  /// skipped. Cost-gated entries that remain gated, or whose replay fails, are pushed back without
  /// spending a retry, and at most `limit` replays run per pass. Settled and dropped entries are
  /// swap-removed, so the index does not advance past them.
  ///
  /// The queue is decoded once and written back at the end of the pass. Entries enqueued while
  /// the pass runs land behind the scanned prefix in storage and are appended on write-back.
  pub(crate) fn process_batch(limit: u32) -> Result<BatchSummary, DispatchError> {
    let mut queue = TradeQueue::<T>::get();
    let scanned = queue.len();
    let limit = limit.min(scanned as u32);
    let mut summary = BatchSummary::default();
    if limit == 0 {
      return Ok(summary);
    }

    let config = Self::portfolio_config()?;
    let now = frame_system::Pallet::<T>::block_number();
    let mut cost: Option<u128> = None;
    let mut index = 0usize;

    while summary.settled() < limit {
      let Some(entry) = queue.get(index).cloned() else {
        break;
      };
      if now < entry.next_eligible {
        index += 1;
        continue;
      }

      let attempt = match entry.reason {
        DeferralReason::CostGate => {
          let current = match cost {
            Some(current) => current,
            None => {
              let current = Self::read_cost()?;
              cost = Some(current);
              current
            }
          };
          match ExecutionPath::decide(current, config.params.cost_threshold) {
            ExecutionPath::Deferred => None,
            ExecutionPath::Immediate if summary.replays_attempted >= limit => {
              index += 1;
              continue;
            }
            ExecutionPath::Immediate => {
              summary.replays_attempted = summary.replays_attempted.saturating_add(1);
              Some(with_storage_layer(|| {
                Self::execute_deferred_action(&entry, &config)
              }))
            }
          }
        }
        DeferralReason::SlippageFailure => {
          summary.swaps_attempted = summary.swaps_attempted.saturating_add(1);
          Some(
            Self::try_swap(
              entry.asset_in,
              entry.asset_out,
              entry.amount_in,
              config.params.slippage_tolerance,
            )
            .map(|_| ()),
          )
        }
      };

      match attempt {
        None => {
          Self::reschedule(&mut queue, index, entry.retry_count);
          summary.rescheduled = summary.rescheduled.saturating_add(1);
          index += 1;
        }
        Some(Ok(())) => {
          queue.swap_remove(index);
          summary.completed = summary.completed.saturating_add(1);
          Self::deposit_event(Event::OperationProcessed {
            id: entry.id,
            kind: entry.kind,
            reason: entry.reason,
          });
        }
        Some(Err(error)) if entry.reason == DeferralReason::CostGate => {
          log::debug!(
            target: LOG_TARGET,
            "replay of operation {} failed: {:?}",
            entry.id,
            error
          );
          Self::reschedule(&mut queue, index, entry.retry_count);
          summary.rescheduled = summary.rescheduled.saturating_add(1);
          index += 1;
        }
        Some(Err(error)) => {
          let retry_count = entry.retry_count.saturating_add(1);
          if retry_count >= config.params.max_retry_attempts {
            queue.swap_remove(index);
            summary.dropped = summary.dropped.saturating_add(1);
            log::warn!(
              target: LOG_TARGET,
              "dropping operation {} after {} failed attempts: {:?}",
              entry.id,
              retry_count,
              error
            );
            Self::deposit_event(Event::OperationPermanentlyFailed {
              id: entry.id,
              initiator: entry.initiator.clone(),
              kind: entry.kind,
              retry_count,
            });
          } else {
            Self::reschedule(&mut queue, index, retry_count);
            summary.rescheduled = summary.rescheduled.saturating_add(1);
            index += 1;
          }
        }
      }
    }

    if TradeQueue::<T>::decode_len().unwrap_or(0) > scanned {
      for operation in TradeQueue::<T>::get().into_iter().skip(scanned) {
        if queue.try_push(operation).is_err() {
          return Err(Error::<T>::QueueFull.into());
        }
      }
    }
    let remaining = queue.len() as u32;
    TradeQueue::<T>::put(queue);

    log::info!(
      target: LOG_TARGET,
      "queue batch: {} completed, {} dropped, {} rescheduled, {} remaining",
      summary.completed,
      summary.dropped,
      summary.rescheduled,
      remaining
    );
    Self::deposit_event(Event::BatchProcessed {
      completed: summary.completed,
      dropped: summary.dropped,
      rescheduled: summary.rescheduled,
      remaining,
    });
    Ok(summary)
  }

  fn execute_deferred_action(
    entry: &QueuedOperationOf<T>,
    config: &PortfolioConfig,
  ) -> DispatchResult {
    match entry.kind {
      OperationKind::Deposit => {
        PendingDeposits::<T>::mutate(|pending| *pending = pending.saturating_sub(entry.amount_in));
        Self::settle_deposit(&entry.initiator, entry.amount_in, config)?;
        Self::ensure_reserve(&config.params)
      }
      OperationKind::Rebalance => Self::rebalance_portfolio(&entry.initiator, config),
      OperationKind::Liquidation => Self::liquidate_portfolio(&entry.initiator, config),
    }
  }

  fn reschedule(
    queue: &mut BoundedVec<QueuedOperationOf<T>, T::MaxQueueLength>,
    index: usize,
    retry_count: u32,
  ) {
    let next_eligible = Self::cooldown_from_now();
    let Some(slot) = queue.get_mut(index) else {
      return;
    };
    slot.retry_count = retry_count;
    slot.next_eligible = next_eligible;
    log::debug!(
      target: LOG_TARGET,
      "operation {} rescheduled to block {:?} after {} retries",
      slot.id,
      next_eligible,
      retry_count
    );
    Self::deposit_event(Event::OperationRescheduled {
      id: slot.id,
      reason: slot.reason,
      retry_count,
      next_eligible,
    });
  }
}
